mod text;

pub use text::{export_file_name, export_note_to_text, write_note_export};
