//! Single-page PDF invoices.
//!
//! Emits a minimal PDF 1.4 document using the built-in Helvetica faces, so no
//! font files are embedded. Text outside printable ASCII is replaced with `?`.

use std::fmt::Write as _;

use rust_decimal::Decimal;

use crate::models::{Order, StoreSettings};

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 50;
const BOTTOM_LIMIT: u32 = 120;

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    const fn resource(self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
        }
    }
}

/// Accumulates text operators for the page content stream.
struct Page {
    content: String,
    y: u32,
}

impl Page {
    fn new() -> Self {
        Self {
            content: String::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn text(&mut self, font: Font, size: u32, x: u32, y: u32, text: &str) {
        let _ = writeln!(
            self.content,
            "BT /{} {size} Tf {x} {y} Td ({}) Tj ET",
            font.resource(),
            escape(text)
        );
    }

    /// Write a line at the cursor and move it down.
    fn line(&mut self, font: Font, size: u32, text: &str) {
        self.text(font, size, MARGIN, self.y, text);
        self.advance(size + 6);
    }

    /// Label on the left, amount right-aligned-ish in the totals column.
    fn amount_row(&mut self, font: Font, label: &str, amount: &str) {
        self.text(font, 10, 330, self.y, label);
        self.text(font, 10, amount_x(amount), self.y, amount);
        self.advance(16);
    }

    fn rule(&mut self) {
        let _ = writeln!(
            self.content,
            "{MARGIN} {} m {} {} l S",
            self.y + 4,
            PAGE_WIDTH - MARGIN,
            self.y + 4
        );
        self.advance(10);
    }

    fn advance(&mut self, by: u32) {
        self.y = self.y.saturating_sub(by);
    }
}

/// Approximate right alignment at the page margin; Helvetica digits are 0.556 em.
fn amount_x(text: &str) -> u32 {
    let width = u32::try_from(text.len()).unwrap_or(20) * 56 / 10;
    (PAGE_WIDTH - MARGIN).saturating_sub(width)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn money(amount: Decimal) -> String {
    format!("Rs. {amount:.2}")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    }
}

/// Render the invoice for `order`.
#[must_use]
pub fn render_invoice(order: &Order, settings: &StoreSettings) -> Vec<u8> {
    let mut page = Page::new();

    page.line(Font::Bold, 20, &settings.store_name);
    if let Some(email) = &settings.support_email {
        page.line(Font::Regular, 9, email);
    }
    if let Some(phone) = &settings.support_phone {
        page.line(Font::Regular, 9, phone);
    }
    page.advance(10);

    page.line(Font::Bold, 14, "Tax Invoice");
    page.line(Font::Regular, 10, &format!("Order: {}", order.order_number));
    page.line(
        Font::Regular,
        10,
        &format!("Date: {}", order.created_at.format("%d %b %Y")),
    );
    page.line(
        Font::Regular,
        10,
        &format!(
            "Payment: {} ({})",
            order.payment_method.as_str().to_uppercase(),
            order.payment_status.as_str().replace('_', " ")
        ),
    );
    page.advance(8);

    page.line(Font::Bold, 11, "Ship to");
    for line in order.shipping_address.lines() {
        page.line(Font::Regular, 10, &line);
    }
    page.advance(8);

    let header_y = page.y;
    page.text(Font::Bold, 10, MARGIN, header_y, "Item");
    page.text(Font::Bold, 10, 330, header_y, "Qty");
    page.text(Font::Bold, 10, 380, header_y, "Price");
    page.text(Font::Bold, 10, amount_x("Amount"), header_y, "Amount");
    page.advance(14);
    page.rule();

    let mut remaining = order.items.len();
    for item in &order.items {
        if page.y < BOTTOM_LIMIT + 100 {
            page.line(Font::Regular, 9, &format!("... and {remaining} more item(s)"));
            break;
        }
        let name = match &item.color {
            Some(color) => format!("{} ({color})", item.name),
            None => item.name.clone(),
        };
        let total = money(item.line_total());
        let y = page.y;
        page.text(Font::Regular, 10, MARGIN, y, &truncate(&name, 48));
        page.text(Font::Regular, 10, 330, y, &item.quantity.to_string());
        page.text(Font::Regular, 10, 380, y, &money(item.unit_price));
        page.text(Font::Regular, 10, amount_x(&total), y, &total);
        page.advance(16);
        remaining -= 1;
    }
    page.rule();

    page.amount_row(Font::Regular, "Subtotal", &money(order.subtotal));
    if order.coupon_discount > Decimal::ZERO {
        let label = order
            .coupon_code
            .as_deref()
            .map_or_else(|| "Coupon".to_string(), |c| format!("Coupon {c}"));
        page.amount_row(Font::Regular, &label, &format!("-{}", money(order.coupon_discount)));
    }
    if order.upi_discount > Decimal::ZERO {
        page.amount_row(
            Font::Regular,
            "UPI discount",
            &format!("-{}", money(order.upi_discount)),
        );
    }
    page.amount_row(Font::Regular, "Shipping", &money(order.shipping_fee));
    if order.cod_fee > Decimal::ZERO {
        page.amount_row(Font::Regular, "COD fee", &money(order.cod_fee));
    }
    page.amount_row(Font::Bold, "Total", &money(order.total));

    page.advance(20);
    page.line(Font::Regular, 9, "Thank you for shopping with us.");

    assemble(&page.content)
}

/// Wrap a content stream into a complete document with a byte-accurate xref table.
fn assemble(content: &str) -> Vec<u8> {
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 4 0 R /F2 5 0 R >> >> /Contents 6 0 R >>"
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{content}endstream",
            content.len()
        ),
    ];

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{body}\nendobj\n", i + 1);
    }

    let xref_offset = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(out, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    );

    out.into_bytes()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use drape_core::{
        OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, ReturnStatus, UserId,
    };

    use super::*;
    use crate::models::{OrderItem, ShippingAddress};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn order() -> Order {
        Order {
            id: OrderId::new(7),
            order_number: "DRP-20260101-ABC123".to_string(),
            user_id: UserId::new(1),
            items: vec![OrderItem {
                product_id: ProductId::new(3),
                name: "Kanjivaram (Silk)".to_string(),
                image: None,
                unit_price: dec("2999"),
                quantity: 2,
                color: Some("Ruby".to_string()),
            }],
            subtotal: dec("5998"),
            coupon_discount: dec("500"),
            upi_discount: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
            cod_fee: dec("49"),
            total: dec("5547"),
            coupon_id: None,
            coupon_code: Some("FESTIVE".to_string()),
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::Confirmed,
            shipping_address: ShippingAddress {
                name: "Meera Iyer".to_string(),
                phone: "9876543210".to_string(),
                line1: "12 Temple Street".to_string(),
                line2: None,
                landmark: None,
                city: "Chennai".to_string(),
                state: "Tamil Nadu".to_string(),
                pincode: "600004".to_string(),
            },
            razorpay_order_id: None,
            razorpay_payment_id: None,
            upi_reference: None,
            return_status: ReturnStatus::NotRequested,
            return_reason: None,
            return_requested_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn settings() -> StoreSettings {
        StoreSettings {
            store_name: "Drape".to_string(),
            support_email: Some("care@drape.in".to_string()),
            support_phone: None,
            currency: "INR".to_string(),
            shipping_fee: dec("99"),
            free_shipping_threshold: Some(dec("1999")),
            cod_enabled: true,
            cod_fee: dec("49"),
            upi_enabled: false,
            upi_vpa: None,
            upi_payee_name: None,
            upi_discount_percent: Decimal::ZERO,
            razorpay_enabled: false,
            return_window_days: 7,
            announcement: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_invoice_structure() {
        let pdf = String::from_utf8(render_invoice(&order(), &settings())).unwrap();
        assert!(pdf.starts_with("%PDF-1.4\n"));
        assert!(pdf.ends_with("%%EOF\n"));
        assert!(pdf.contains("(Order: DRP-20260101-ABC123) Tj"));
        assert!(pdf.contains("(Kanjivaram \\(Silk\\) \\(Ruby\\)) Tj"));
        assert!(pdf.contains("(Coupon FESTIVE) Tj"));
        assert!(pdf.contains("(Rs. 5547.00) Tj"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let pdf = String::from_utf8(render_invoice(&order(), &settings())).unwrap();
        let startxref: usize = pdf
            .rsplit("startxref\n")
            .next()
            .unwrap()
            .lines()
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!(pdf[startxref..].starts_with("xref\n0 7\n"));

        let entries: Vec<usize> = pdf[startxref..]
            .lines()
            .skip(3)
            .take(6)
            .map(|l| l[..10].parse().unwrap())
            .collect();
        for (i, offset) in entries.iter().enumerate() {
            assert!(pdf[*offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn test_stream_length_matches() {
        let pdf = assemble("BT /F1 10 Tf 50 50 Td (x) Tj ET\n");
        let pdf = String::from_utf8(pdf).unwrap();
        assert!(pdf.contains("<< /Length 32 >>"));
    }

    #[test]
    fn test_escape_non_ascii() {
        assert_eq!(escape("Saree ₹ (new)"), "Saree ? \\(new\\)");
    }
}
