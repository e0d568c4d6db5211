//! In-memory PDF file builder for tests.
#![allow(dead_code)]

/// Builds a classic PDF file: header, numbered objects, one xref table,
/// trailer and `startxref`.
#[derive(Debug, Clone)]
pub struct PdfBuilder {
    version: String,
    objects: Vec<Vec<u8>>,
    trailer: String,
}

/// A built file plus where its pieces start.
#[derive(Debug, Clone)]
pub struct BuiltPdf {
    pub data: Vec<u8>,
    /// Offset of object `n` at index `n - 1`.
    pub offsets: Vec<usize>,
    pub xref_offset: usize,
}

impl PdfBuilder {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            objects: Vec::new(),
            trailer: String::new(),
        }
    }

    /// Three objects: catalog, page tree, one page.
    pub fn single_page() -> Self {
        Self::new("1.4")
            .object("<< /Type /Catalog /Pages 2 0 R >>")
            .object("<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
            .object("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> >>")
            .trailer("/Root 1 0 R")
    }

    /// Append an object; its number is its position, starting at 1.
    pub fn object(mut self, body: &str) -> Self {
        self.objects.push(body.as_bytes().to_vec());
        self
    }

    /// Append a stream object with `dict` entries (without `<< >>`).
    pub fn stream(mut self, dict: &str, data: &[u8]) -> Self {
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.push(body);
        self
    }

    /// Extra trailer entries; `/Size` is added automatically.
    pub fn trailer(mut self, entries: &str) -> Self {
        self.trailer = entries.to_string();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_offsets().data
    }

    pub fn build_with_offsets(&self) -> BuiltPdf {
        let mut data = format!("%PDF-{}\n%\u{e2}\u{e3}\n", self.version).into_bytes();
        let mut offsets = Vec::new();
        for (i, body) in self.objects.iter().enumerate() {
            offsets.push(data.len());
            data.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            data.extend_from_slice(body);
            data.extend_from_slice(b"\nendobj\n");
        }
        let xref_offset = data.len();
        data.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", self.objects.len() + 1).as_bytes());
        for offset in &offsets {
            data.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        data.extend_from_slice(
            format!(
                "trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n",
                self.objects.len() + 1,
                self.trailer,
                xref_offset
            )
            .as_bytes(),
        );
        BuiltPdf {
            data,
            offsets,
            xref_offset,
        }
    }
}
