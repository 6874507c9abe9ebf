//! In-memory PDF fixtures for tests.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// A document with one empty page per `(width, height)` entry, in points.
pub fn pdf_with_pages(sizes: &[(i64, i64)]) -> Vec<u8> {
    build(sizes.iter().map(|&(width, height)| Some((width, height))).collect(), None, b"")
}

/// A single page with a black square filling its middle four fifths, so
/// content-rendering backends have something to draw.
pub fn pdf_with_filled_square(side: i64) -> Vec<u8> {
    let inset = side / 10;
    let extent = side - 2 * inset;
    let content = format!("0 0 0 rg {inset} {inset} {extent} {extent} re f");
    build(vec![Some((side, side))], None, content.as_bytes())
}

/// A document whose pages inherit their MediaBox from the page tree root.
pub fn pdf_with_inherited_media_box(width: i64, height: i64, pages: usize) -> Vec<u8> {
    build(vec![None; pages], Some((width, height)), b"")
}

pub fn invalid_pdf() -> Vec<u8> {
    b"%PDF-1.7\nthis is not really a pdf\n".to_vec()
}

/// Bytes carrying an `/Encrypt` marker, enough to trip the encryption check.
pub fn encrypted_marker_pdf() -> Vec<u8> {
    let mut bytes = pdf_with_pages(&[(612, 792)]);
    bytes.extend_from_slice(b"\n% /Encrypt 9 0 R\n");
    bytes
}

fn media_box(width: i64, height: i64) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(width),
        Object::Integer(height),
    ])
}

fn build(pages: Vec<Option<(i64, i64)>>, inherited: Option<(i64, i64)>, content: &[u8]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());

    for size in &pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let Some((width, height)) = size {
            page.set("MediaBox", media_box(*width, *height));
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut tree = dictionary! {
        "Type" => "Pages",
        "Count" => Object::Integer(pages.len() as i64),
        "Kids" => kids,
    };
    if let Some((width, height)) = inherited {
        tree.set("MediaBox", media_box(width, height));
    }
    doc.objects.insert(pages_id, Object::Dictionary(tree));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture document should serialize");
    bytes
}
