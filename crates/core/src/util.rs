use pkgnav_api::{Position, Url};

/// Last path segment of a URI, decoded when the URI is a local file.
pub fn file_name(uri: &Url) -> Option<String> {
    if uri.scheme() == "file" {
        if let Ok(path) = uri.to_file_path() {
            if let Some(name) = path.file_name() {
                return Some(name.to_string_lossy().into_owned());
            }
        }
    }
    uri.path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()
        .map(str::to_string)
}

/// File name up to its first `.`: `Widget.d.ts` and `Widget.ts` both give `Widget`.
pub fn file_stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Directory form of a URI (trailing `/`), so string-prefix checks stop at
/// segment boundaries.
pub fn as_directory(uri: &Url) -> Url {
    let mut dir = uri.clone();
    if !dir.path().ends_with('/') {
        if let Ok(mut segments) = dir.path_segments_mut() {
            segments.push("");
        }
    }
    dir
}

/// URI of `name` inside `dir`. Directories get a trailing `/`.
pub fn child_uri(dir: &Url, name: &str, is_dir: bool) -> Url {
    let mut child = dir.clone();
    if let Ok(mut segments) = child.path_segments_mut() {
        segments.pop_if_empty().push(name);
        if is_dir {
            segments.push("");
        }
    }
    child
}

/// `root` joined with a relative fragment such as `node_modules` or `./dist/`.
pub fn join_fragment(root: &Url, fragment: &str) -> Url {
    let mut joined = root.clone();
    if let Ok(mut segments) = joined.path_segments_mut() {
        segments.pop_if_empty();
        segments.extend(
            fragment
                .split(['/', '\\'])
                .filter(|s| !s.is_empty() && *s != "."),
        );
    }
    joined
}

/// Whether `uri` lies under the directory `root`.
pub fn is_under(root: &Url, uri: &Url) -> bool {
    uri.as_str().starts_with(as_directory(root).as_str())
}

/// Byte offset of an LSP position. Columns past the end of the line clamp to it.
pub fn position_to_offset(content: &str, position: Position) -> usize {
    let mut offset = 0;
    for (idx, line) in content.split_inclusive('\n').enumerate() {
        if idx == position.line as usize {
            return offset + utf16_col_to_byte_col(line, position.character as usize);
        }
        offset += line.len();
    }
    content.len()
}

/// LSP position of a byte offset.
pub fn offset_to_position(content: &str, offset: usize) -> Position {
    let mut line = 0u32;
    let mut col = 0u32;
    for (i, ch) in content.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += ch.len_utf16() as u32;
        }
    }
    Position::new(line, col)
}

fn utf16_col_to_byte_col(line_content: &str, utf16_col: usize) -> usize {
    let mut curr_utf16 = 0;
    let mut curr_byte = 0;

    for c in line_content.chars() {
        if curr_utf16 >= utf16_col || c == '\n' || c == '\r' {
            break;
        }
        curr_utf16 += c.len_utf16();
        curr_byte += c.len_utf8();
    }
    curr_byte
}

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Identifier under (or immediately before) the cursor.
pub fn word_at(content: &str, position: Position) -> Option<&str> {
    let offset = position_to_offset(content, position);
    let line_start = content[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = content[offset..]
        .find('\n')
        .map(|i| i + offset)
        .unwrap_or(content.len());
    let line = &content[line_start..line_end];
    let col = offset - line_start;

    let start = line[..col]
        .rfind(|c| !is_ident_char(c))
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = line[col..]
        .find(|c| !is_ident_char(c))
        .map(|i| i + col)
        .unwrap_or(line.len());

    (start < end).then(|| &line[start..end])
}
