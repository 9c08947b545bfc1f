// server/src/services/renderer.rs

//! Invoice documents: a renderer that turns a structured invoice into bytes, and an
//! artifact store that keeps those bytes and hands back a URL.

use crate::config::CompanyProfile;
use crate::errors::{AppError, Result};
use crate::models::Invoice;
use crate::money::format_minor;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{event, Level};

/// Everything printed on an invoice.
#[derive(Debug, Clone)]
pub struct InvoiceDocument {
  pub company: CompanyProfile,
  pub order_number: Option<String>,
  pub invoice: Invoice,
}

impl InvoiceDocument {
  pub fn file_name(&self) -> String {
    format!("{}.pdf", self.invoice.number)
  }

  /// Plain-text lines of the document, top to bottom.
  pub fn lines(&self) -> Vec<String> {
    let inv = &self.invoice;
    let mut out = vec![self.company.name.clone()];
    if let Some(address) = &self.company.address {
      out.push(address.clone());
    }
    if let Some(gstin) = &self.company.gstin {
      out.push(format!("GSTIN: {}", gstin));
    }
    out.push(String::new());
    out.push(format!("TAX INVOICE  {}", inv.number));
    out.push(format!("Date: {}", inv.created_at.format("%d-%m-%Y")));
    if let Some(order_number) = &self.order_number {
      out.push(format!("Order: {}", order_number));
    }
    out.push(String::new());

    out.push(format!("Bill to: {}", inv.buyer_snapshot.name));
    if let Some(address) = &inv.buyer_snapshot.address {
      out.push(format!("  {}", address));
    }
    if let Some(gstin) = &inv.buyer_snapshot.gstin {
      out.push(format!("  GSTIN: {}", gstin));
    }
    if let Some(seller) = &inv.seller_snapshot {
      out.push(format!("Sold by: {}", seller.name));
      if let Some(gstin) = &seller.gstin {
        out.push(format!("  GSTIN: {}", gstin));
      }
    }
    out.push(String::new());

    out.push(format!("{:<32} {:>5} {:>12} {:>12}", "Item", "Qty", "Rate", "Amount"));
    for item in &inv.items {
      let mut name = item.name.clone();
      if let Some(brand) = &item.brand {
        name = format!("{} ({})", name, brand);
      }
      let name: String = name.chars().take(32).collect();
      out.push(format!(
        "{:<32} {:>5} {:>12} {:>12}",
        name,
        item.quantity,
        format_minor(item.unit_price),
        format_minor(item.line_total)
      ));
    }
    out.push(String::new());

    out.push(format!("{:<51} {:>12}", "Subtotal", format_minor(inv.subtotal)));
    out.push(format!("{:<51} {:>12}", "Discount", format_minor(inv.discount_total)));
    out.push(format!("{:<51} {:>12}", "GST", format_minor(inv.gst_total)));
    out.push(format!("{:<51} {:>12}", "Grand total (Rs.)", format_minor(inv.grand_total)));
    out.push(format!("{:<51} {:>12}", "Paid", format_minor(inv.amount_paid)));
    out.push(format!("{:<51} {:>12}", "Balance due", format_minor(inv.balance_due)));

    if let Some(qr) = &inv.qr {
      out.push(String::new());
      out.push(format!("Pay by UPI (ref {}):", qr.qr_id));
      out.push(qr.qr_payload.clone());
    }
    out
  }
}

/// Structured invoice in, document bytes out.
pub trait InvoiceRenderer: Send + Sync {
  fn content_type(&self) -> &'static str;
  fn render(&self, document: &InvoiceDocument) -> Result<Vec<u8>>;
}

const PAGE_LINES: usize = 64;

/// Writes a PDF with the document lines in a monospace font, `PAGE_LINES` lines per page.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextPdfRenderer;

impl TextPdfRenderer {
  fn escape(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
      match c {
        '(' | ')' | '\\' => {
          out.push('\\');
          out.push(c);
        }
        c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
        _ => out.push('?'),
      }
    }
    out
  }

  fn content_stream(lines: &[String]) -> String {
    let mut stream = String::from("BT\n/F1 9 Tf\n11 TL\n40 800 Td\n");
    for line in lines {
      stream.push_str(&format!("({}) Tj T*\n", Self::escape(line)));
    }
    stream.push_str("ET");
    stream
  }

  /// Page-sized chunks; an empty document still gets one blank page.
  fn pages(lines: &[String]) -> Vec<&[String]> {
    if lines.is_empty() {
      return vec![lines];
    }
    lines.chunks(PAGE_LINES).collect()
  }
}

impl InvoiceRenderer for TextPdfRenderer {
  fn content_type(&self) -> &'static str {
    "application/pdf"
  }

  fn render(&self, document: &InvoiceDocument) -> Result<Vec<u8>> {
    let lines = document.lines();

    // 1: catalog, 2: page tree, 3: font, then a page and its content stream per chunk.
    let mut objects = vec![
      "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
      String::new(),
      "<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>".to_string(),
    ];
    let mut kids = Vec::new();
    for chunk in Self::pages(&lines) {
      let page_id = objects.len() + 1;
      let stream = Self::content_stream(chunk);
      kids.push(format!("{} 0 R", page_id));
      objects.push(format!(
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
        page_id + 1
      ));
      objects.push(format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream));
    }
    objects[1] = format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), kids.len());

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (idx, body) in objects.iter().enumerate() {
      offsets.push(pdf.len());
      pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", idx + 1, body));
    }
    let xref_at = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
      pdf.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.push_str(&format!(
      "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
      objects.len() + 1,
      xref_at
    ));
    Ok(pdf.into_bytes())
  }
}

/// Keeps rendered documents and serves them back by name.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
  /// Stores `bytes` under `name` and returns the public URL.
  async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<String>;
  async fn get(&self, name: &str) -> Result<Vec<u8>>;
}

/// Artifact store on a local directory, served under `/api/v1/files/invoices/`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
  dir: PathBuf,
  base_url: String,
}

impl LocalArtifactStore {
  pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
    Self {
      dir: dir.into(),
      base_url: base_url.into(),
    }
  }

  fn checked_path(&self, name: &str) -> Result<PathBuf> {
    let valid = !name.is_empty()
      && !name.starts_with('.')
      && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
      return Err(AppError::InvalidInput(format!("Invalid artifact name '{}'", name)));
    }
    Ok(self.dir.join(name))
  }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
  async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
    let path = self.checked_path(name)?;
    tokio::fs::create_dir_all(&self.dir)
      .await
      .map_err(|e| AppError::Internal(format!("Cannot create artifact dir: {}", e)))?;
    tokio::fs::write(&path, bytes)
      .await
      .map_err(|e| AppError::Internal(format!("Cannot write artifact {}: {}", name, e)))?;
    event!(Level::DEBUG, path = %path.display(), "Artifact stored.");
    Ok(format!("{}/api/v1/files/invoices/{}", self.base_url, name))
  }

  async fn get(&self, name: &str) -> Result<Vec<u8>> {
    let path = self.checked_path(name)?;
    tokio::fs::read(&path).await.map_err(|e| match e.kind() {
      ErrorKind::NotFound => AppError::NotFound(format!("Artifact {} not found", name)),
      _ => AppError::Internal(format!("Cannot read artifact {}: {}", name, e)),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn escapes_pdf_string_delimiters() {
    assert_eq!(TextPdfRenderer::escape("Atta (10kg) \\ ₹"), "Atta \\(10kg\\) \\\\ ?");
  }

  #[test]
  fn long_documents_are_split_into_pages() {
    let lines: Vec<String> = (0..150).map(|i| format!("line {}", i)).collect();
    let pages = TextPdfRenderer::pages(&lines);
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0].len(), PAGE_LINES);
    assert_eq!(pages[2].last().map(String::as_str), Some("line 149"));

    assert_eq!(TextPdfRenderer::pages(&[]).len(), 1);
  }

  #[tokio::test]
  async fn local_store_round_trips_and_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalArtifactStore::new(dir.path(), "http://localhost:8080");

    let url = store.put("INV-1.pdf", b"%PDF".to_vec()).await.unwrap();
    assert_eq!(url, "http://localhost:8080/api/v1/files/invoices/INV-1.pdf");
    assert_eq!(store.get("INV-1.pdf").await.unwrap(), b"%PDF".to_vec());

    assert!(matches!(store.get("missing.pdf").await, Err(AppError::NotFound(_))));
    assert!(matches!(store.get("../secret").await, Err(AppError::InvalidInput(_))));
  }
}
