//! Human-readable rendering of buffer elements.

use std::fmt::Write;

use strata_core::BufferId;

use crate::error::BufferError;
use crate::table::BufferTable;

impl BufferTable {
    /// Render one element according to the buffer's [`ElementKind`].
    ///
    /// Scalars print bare, vector kinds print comma-separated components,
    /// and floats use six decimals. `Misc` elements (or elements too short
    /// for their kind) print as space-separated hex bytes.
    ///
    /// [`ElementKind`]: strata_core::ElementKind
    pub fn format_element(&self, id: BufferId, index: usize) -> Result<String, BufferError> {
        let bytes = self.element(id, index)?;
        let kind = self.slots[self.resolve(id)?].buffer.kind();
        let text = match kind.decode(bytes) {
            Some(values) => values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            None => hex_bytes(bytes),
        };
        Ok(text)
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use strata_core::{ElementKind, UsageFlags};

    use super::*;
    use crate::config::TableConfig;

    fn table_with(kind: ElementKind, stride: usize, bytes: &[u8]) -> BufferTable {
        let mut t = BufferTable::new(TableConfig::new(4)).unwrap();
        t.register(BufferId(0), "x", stride, 1, UsageFlags::CPU).unwrap();
        t.set_kind(BufferId(0), kind).unwrap();
        t.raw_copy_in(BufferId(0), bytes, 1).unwrap();
        t
    }

    #[test]
    fn scalar_kinds() {
        let t = table_with(ElementKind::Int, 4, &(-7i32).to_ne_bytes());
        assert_eq!(t.format_element(BufferId(0), 0).unwrap(), "-7");
        let t = table_with(ElementKind::UInt, 4, &40u32.to_ne_bytes());
        assert_eq!(t.format_element(BufferId(0), 0).unwrap(), "40");
        let t = table_with(ElementKind::Float, 4, &1.5f32.to_ne_bytes());
        assert_eq!(t.format_element(BufferId(0), 0).unwrap(), "1.500000");
    }

    #[test]
    fn vector_kind_is_comma_separated() {
        let bytes: Vec<u8> = [1.0f32, -2.0, 0.25]
            .iter()
            .flat_map(|f| f.to_ne_bytes())
            .collect();
        let t = table_with(ElementKind::Float3, 12, &bytes);
        assert_eq!(
            t.format_element(BufferId(0), 0).unwrap(),
            "1.000000,-2.000000,0.250000"
        );
    }

    #[test]
    fn misc_and_short_elements_render_hex() {
        let t = table_with(ElementKind::Misc, 3, &[0x0a, 0xff, 0x00]);
        assert_eq!(t.format_element(BufferId(0), 0).unwrap(), "0a ff 00");
        let t = table_with(ElementKind::Float4, 2, &[1, 2]);
        assert_eq!(t.format_element(BufferId(0), 0).unwrap(), "01 02");
    }

    #[test]
    fn missing_element_is_an_error() {
        let t = table_with(ElementKind::Int, 4, &[0; 4]);
        assert!(matches!(
            t.format_element(BufferId(0), 1),
            Err(BufferError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            t.format_element(BufferId(1), 0),
            Err(BufferError::UnknownBuffer { .. })
        ));
    }
}
