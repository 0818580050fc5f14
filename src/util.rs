pub mod format_bytes;
