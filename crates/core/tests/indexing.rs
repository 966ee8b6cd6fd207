mod common;

use common::{Harness, MemoryFs, package, uri};
use pkgnav_api::FileSystem;
use pkgnav_core::config::Settings;
use pkgnav_core::walk::{Exclusions, PackageWalker};
use pkgnav_core::join_all;
use std::sync::Arc;

fn foo_tree() -> Arc<MemoryFs> {
    let fs = MemoryFs::new();
    fs.write(
        "/pkgs/foo/src/Widget.ts",
        "export class Widget {\n    render(): void {\n    }\n}\n",
    );
    fs.write(
        "/pkgs/foo/src/util.ts",
        "export function parse(a: string): void;\nexport function parse(a: number): void;\nexport function parse(a: any) {\n}\nexport const VERSION = 1;\n",
    );
    fs.write("/pkgs/foo/src/Widget.d.ts", "export declare class Ghost {}\n");
    fs.write("/pkgs/foo/package.json", r#"{ "name": "foo", "version": "1.2.0" }"#);
    fs.write(
        "/pkgs/foo/node_modules/dep/index.ts",
        "export function hidden() {}\n",
    );
    fs
}

fn foo_settings() -> Settings {
    Settings::new(
        vec![package("foo", "/pkgs/foo").with_excludes(["node_modules"])],
        false,
    )
}

#[tokio::test]
async fn test_full_build_indexes_declarations_by_stem() {
    let harness = Harness::new(foo_tree(), foo_settings());
    harness.rebuild().await;
    let index = harness.navigator.index();

    let widget = index.lookup("foo", "Widget", "Widget").unwrap();
    assert_eq!(widget.first().unwrap().uri, uri("/pkgs/foo/src/Widget.ts"));
    assert!(index.lookup("foo", "Widget", "Widget/render").is_some());

    let parse = index.lookup("foo", "util", "parse").unwrap();
    assert!(parse.is_multiple());
    assert_eq!(parse.len(), 3);
    let lines: Vec<u32> = parse.locations().iter().map(|l| l.range.start.line).collect();
    assert_eq!(lines, vec![0, 1, 2]);

    assert!(!index.lookup("foo", "util", "VERSION").unwrap().is_multiple());
}

#[tokio::test]
async fn test_declaration_files_and_excluded_paths_are_skipped() {
    let fs = foo_tree();
    let harness = Harness::new(fs.clone(), foo_settings());
    harness.rebuild().await;
    let index = harness.navigator.index();

    assert!(index.lookup("foo", "Widget", "Ghost").is_none());
    assert!(index.lookup("foo", "index", "hidden").is_none());
    assert!(
        !fs.listed().iter().any(|dir| dir.contains("node_modules")),
        "excluded directory was listed: {:?}",
        fs.listed()
    );
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let harness = Harness::new(foo_tree(), foo_settings());
    harness.rebuild().await;
    let first = harness.navigator.index().entries("foo");
    harness.rebuild().await;
    let second = harness.navigator.index().entries("foo");
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[tokio::test]
async fn test_unreadable_file_is_skipped() {
    let fs = foo_tree();
    fs.make_unreadable("/pkgs/foo/src/Widget.ts");
    let harness = Harness::new(fs, foo_settings());

    let reports = join_all(harness.navigator.rebuild_all().await).await;
    let report = reports.into_iter().flatten().next().unwrap();
    assert_eq!(report.files_failed, 1);
    assert_eq!(report.files_indexed, 1);
    assert!(!report.superseded);

    let index = harness.navigator.index();
    assert!(index.lookup("foo", "Widget", "Widget").is_none());
    assert!(index.lookup("foo", "util", "parse").is_some());
}

#[tokio::test]
async fn test_missing_root_is_skipped_without_error() {
    let settings = Settings::new(
        vec![package("foo", "/pkgs/foo"), package("gone", "/pkgs/gone")],
        false,
    );
    let harness = Harness::new(foo_tree(), settings);
    let handles = harness.navigator.rebuild_all().await;
    assert_eq!(handles.len(), 1);
    join_all(handles).await;
    assert_eq!(harness.navigator.index().package_names(), vec!["foo".to_string()]);
}

#[tokio::test]
async fn test_save_replaces_only_the_saved_file() {
    let fs = foo_tree();
    fs.write("/pkgs/foo/lib/Widget.ts", "export class Widget {\n}\n");
    let harness = Harness::new(fs.clone(), foo_settings());
    harness.rebuild().await;
    let index = harness.navigator.index();
    assert_eq!(index.lookup("foo", "Widget", "Widget").unwrap().len(), 2);

    fs.write(
        "/pkgs/foo/src/Widget.ts",
        "export class Gadget {\n}\n",
    );
    let saved = join_all(
        harness
            .navigator
            .file_saved(&uri("/pkgs/foo/src/Widget.ts"))
            .await,
    )
    .await;
    assert_eq!(saved.len(), 1);

    let widget = index.lookup("foo", "Widget", "Widget").unwrap();
    assert!(!widget.is_multiple());
    assert_eq!(widget.first().unwrap().uri, uri("/pkgs/foo/lib/Widget.ts"));
    assert!(index.lookup("foo", "Widget", "Gadget").is_some());
    assert!(index.lookup("foo", "Widget", "Widget/render").is_none());
}

#[tokio::test]
async fn test_save_outside_packages_and_of_declaration_files_is_ignored() {
    let harness = Harness::new(foo_tree(), foo_settings());
    harness.rebuild().await;
    let before = harness.navigator.index().entries("foo");

    let outside = harness.navigator.file_saved(&uri("/app/src/main.ts")).await;
    assert!(outside.is_empty());

    let dts = join_all(
        harness
            .navigator
            .file_saved(&uri("/pkgs/foo/src/Widget.d.ts"))
            .await,
    )
    .await;
    assert_eq!(dts, vec![None]);
    assert_eq!(harness.navigator.index().entries("foo"), before);
}

#[tokio::test]
async fn test_deleted_file_is_forgotten() {
    let fs = foo_tree();
    let harness = Harness::new(fs.clone(), foo_settings());
    harness.rebuild().await;

    fs.remove("/pkgs/foo/src/util.ts");
    harness.navigator.file_deleted(&uri("/pkgs/foo/src/util.ts"));
    assert!(harness.navigator.index().lookup("foo", "util", "parse").is_none());
    assert!(harness.navigator.index().lookup("foo", "Widget", "Widget").is_some());
}

#[tokio::test]
async fn test_settings_change_drops_removed_packages() {
    let fs = foo_tree();
    fs.write("/pkgs/bar/src/Bar.ts", "export class Bar {}\n");
    let settings = Settings::new(
        vec![package("foo", "/pkgs/foo"), package("bar", "/pkgs/bar")],
        false,
    );
    let harness = Harness::new(fs, settings);
    harness.rebuild().await;
    assert_eq!(harness.navigator.index().stats().packages, 2);

    let handles = harness
        .navigator
        .apply_settings(Settings::new(vec![package("bar", "/pkgs/bar")], false))
        .await;
    join_all(handles).await;
    assert_eq!(
        harness.navigator.index().package_names(),
        vec!["bar".to_string()]
    );
    assert!(harness.navigator.index().lookup("bar", "Bar", "Bar").is_some());
}

#[tokio::test]
async fn test_newer_full_rebuild_supersedes_pending_one() {
    let harness = Harness::new(foo_tree(), foo_settings());
    let first = harness.navigator.rebuild_all().await;
    let second = harness.navigator.rebuild_all().await;

    let first = join_all(first).await;
    let second = join_all(second).await;
    assert_eq!(first.len(), 1);
    assert!(first[0].is_none(), "superseded rebuild still ran");
    let report = second.into_iter().flatten().next().unwrap();
    assert!(!report.superseded);

    let clean = Harness::new(foo_tree(), foo_settings());
    clean.rebuild().await;
    assert_eq!(
        harness.navigator.index().entries("foo"),
        clean.navigator.index().entries("foo")
    );
}

#[tokio::test]
async fn test_running_rebuild_stops_when_superseded() {
    let fs = foo_tree();
    let gate = fs.hold_listing("/pkgs/foo/src");
    let harness = Harness::new(fs.clone(), foo_settings());

    let first = harness.navigator.rebuild_all().await;
    while !fs.is_holding() {
        tokio::task::yield_now().await;
    }
    let second = harness.navigator.rebuild_all().await;
    gate.notify_one();

    let first = join_all(first).await.into_iter().flatten().next().unwrap();
    assert!(first.superseded);
    assert_eq!(first.files_indexed, 0);
    let second = join_all(second).await.into_iter().flatten().next().unwrap();
    assert!(!second.superseded);
    assert!(second.generation > first.generation);

    let clean = Harness::new(foo_tree(), foo_settings());
    clean.rebuild().await;
    assert_eq!(
        harness.navigator.index().entries("foo"),
        clean.navigator.index().entries("foo")
    );
}

#[tokio::test]
async fn test_removing_package_cancels_its_rebuild() {
    let fs = foo_tree();
    fs.write("/pkgs/bar/src/Bar.ts", "export class Bar {}\n");
    let gate = fs.hold_listing("/pkgs/foo/src");
    let settings = Settings::new(
        vec![package("foo", "/pkgs/foo"), package("bar", "/pkgs/bar")],
        false,
    );
    let harness = Harness::new(fs.clone(), settings);

    let pending = harness.navigator.rebuild_all().await;
    while !fs.is_holding() {
        tokio::task::yield_now().await;
    }
    let handles = harness
        .navigator
        .apply_settings(Settings::new(vec![package("bar", "/pkgs/bar")], false))
        .await;
    gate.notify_one();

    let reports: Vec<_> = join_all(pending).await.into_iter().flatten().collect();
    let foo = reports.iter().find(|r| r.package == "foo").unwrap();
    assert!(foo.superseded);
    join_all(handles).await;

    let index = harness.navigator.index();
    assert_eq!(index.package_names(), vec!["bar".to_string()]);
    assert!(index.lookup("foo", "Widget", "Widget").is_none());
}

#[tokio::test]
async fn test_walker_visits_in_pre_order() {
    let fs = MemoryFs::new();
    fs.write("/root/a.ts", "");
    fs.write("/root/b/c.ts", "");
    fs.write("/root/b/d/e.ts", "");
    fs.write("/root/f.ts", "");
    fs.write("/root/skip/g.ts", "");

    let root = uri("/root/");
    let fs_dyn: Arc<dyn FileSystem> = fs.clone();
    let mut walker = PackageWalker::new(fs_dyn, root.clone())
        .with_exclusions(Exclusions::new(&root, &["./skip/".to_string()]));
    let mut seen = Vec::new();
    while let Some(file) = walker.next_file().await {
        seen.push(file.uri.path().to_string());
    }
    assert_eq!(
        seen,
        vec!["/root/a.ts", "/root/b/c.ts", "/root/b/d/e.ts", "/root/f.ts"]
    );
    assert!(!fs.listed().contains(&"/root/skip".to_string()));
}
