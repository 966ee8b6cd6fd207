fn main() {
    if let Err(e) = pkgnav_cli::run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
