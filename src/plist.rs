//! Minimal XML property-list editing for Transmission on macOS
//!
//! The Mac variant of Transmission keeps its transfer list in
//! `Transfers.plist`, an XML plist whose root is an array of
//! dictionaries. Appending an entry only needs to splice a `<dict>`
//! before the closing `</array>`, so no general XML machinery is pulled
//! in; an unreadable or missing document is replaced by a fresh one.

/// One transfer entry to append.
pub struct TransferEntry {
    pub active: bool,
    pub internal_torrent_path: String,
    pub torrent_hash: String,
}

const EMPTY_DOCUMENT: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" ",
    "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
    "<plist version=\"1.0\">\n",
    "<array>\n",
    "</array>\n",
    "</plist>\n",
);

/// Returns `existing` with `entry` appended to its transfer array, or a
/// fresh single-entry document when `existing` is absent or unusable.
pub fn append_entry(existing: Option<&str>, entry: &TransferEntry) -> String {
    let document = match existing {
        Some(doc) if doc.contains("</array>") => doc.replace("<array/>", "<array>\n</array>"),
        Some(doc) if doc.contains("<array/>") => doc.replace("<array/>", "<array>\n</array>"),
        _ => EMPTY_DOCUMENT.to_owned(),
    };

    let xml = entry_xml(entry);
    match document.rfind("</array>") {
        Some(pos) => {
            let mut result = String::with_capacity(document.len() + xml.len());
            result.push_str(&document[..pos]);
            result.push_str(&xml);
            result.push_str(&document[pos..]);
            result
        }
        None => {
            // The replace above guarantees a closing tag; fall back to a
            // fresh document all the same.
            append_entry(None, entry)
        }
    }
}

fn entry_xml(entry: &TransferEntry) -> String {
    let mut xml = String::new();
    xml.push_str("\t<dict>\n");
    push_key(&mut xml, "Active");
    xml.push_str(if entry.active {
        "\t\t<true/>\n"
    } else {
        "\t\t<false/>\n"
    });
    push_key(&mut xml, "GroupValue");
    xml.push_str("\t\t<integer>-1</integer>\n");
    push_key(&mut xml, "InternalTorrentPath");
    push_string(&mut xml, &entry.internal_torrent_path);
    push_key(&mut xml, "RemoveWhenFinishedSeeding");
    xml.push_str("\t\t<false/>\n");
    push_key(&mut xml, "TorrentHash");
    push_string(&mut xml, &entry.torrent_hash);
    push_key(&mut xml, "WaitToStart");
    xml.push_str("\t\t<false/>\n");
    xml.push_str("\t</dict>\n");
    xml
}

fn push_key(xml: &mut String, key: &str) {
    xml.push_str("\t\t<key>");
    xml.push_str(key);
    xml.push_str("</key>\n");
}

fn push_string(xml: &mut String, value: &str) {
    xml.push_str("\t\t<string>");
    xml.push_str(&escape(value));
    xml.push_str("</string>\n");
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
