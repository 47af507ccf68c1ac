use crate::error::Result;

/// Write side of the camera link.
///
/// Implemented by whatever owns the GATT command characteristic. Each call is
/// one attribute write of at most one frame; implementations must not split or
/// coalesce writes.
pub trait CommandWriter {
    /// Write one frame to the command characteristic.
    fn write_command(&mut self, frame: &[u8]) -> Result<()>;
}

impl<W: CommandWriter + ?Sized> CommandWriter for &mut W {
    fn write_command(&mut self, frame: &[u8]) -> Result<()> {
        (**self).write_command(frame)
    }
}

impl<W: CommandWriter + ?Sized> CommandWriter for Box<W> {
    fn write_command(&mut self, frame: &[u8]) -> Result<()> {
        (**self).write_command(frame)
    }
}

/// Render bytes for logs: printable ASCII as-is, backslash doubled, anything
/// else as `\xNN`.
pub fn ascii_preview(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out
}
