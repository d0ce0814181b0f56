//! Small generated PDFs for tests.

use crate::PdfEngineError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use md5::{Digest, Md5};

/// Padding string from the standard security handler.
const PASSWORD_PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];
const FILE_ID: &[u8; 16] = b"pageview-fixture";
const KEY_LEN: usize = 16;
const PERMISSIONS: i32 = -4;

/// Builder for a one-text-line-per-page PDF with a 200x300pt media box.
#[derive(Debug, Clone, Default)]
pub struct SamplePdf {
    pages: Vec<String>,
    title: Option<String>,
    author: Option<String>,
    passwords: Option<(String, String)>,
}

impl SamplePdf {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document with `count` pages reading "Page 1", "Page 2", ...
    pub fn numbered(count: u32) -> Self {
        (1..=count).fold(Self::new(), |sample, number| sample.page(&format!("Page {number}")))
    }

    pub fn page(mut self, text: &str) -> Self {
        self.pages.push(text.to_owned());
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = Some(author.to_owned());
        self
    }

    /// Encrypts the document (RC4, 128-bit key, revision 4). An empty
    /// `user_password` gives an owner-only file that opens without a prompt.
    pub fn protect(mut self, user_password: &str, owner_password: &str) -> Self {
        self.passwords = Some((user_password.to_owned(), owner_password.to_owned()));
        self
    }

    pub fn build(&self) -> Result<Vec<u8>, PdfEngineError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::with_capacity(self.pages.len());
        for text in &self.pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![20.into(), 250.into()]),
                    Operation::new("Tj", vec![Object::string_literal(text.as_str())]),
                    Operation::new("ET", vec![]),
                ],
            };
            let encoded = content.encode()?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 200.into(), 300.into()],
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if self.title.is_some() || self.author.is_some() {
            let mut info = Dictionary::new();
            if let Some(title) = &self.title {
                info.set("Title", Object::string_literal(title.as_str()));
            }
            if let Some(author) = &self.author {
                info.set("Author", Object::string_literal(author.as_str()));
            }
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", info_id);
        }

        if let Some((user, owner)) = &self.passwords {
            encrypt(&mut doc, user, owner);
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).map_err(|err| PdfEngineError::Backend(err.to_string()))?;
        Ok(buffer)
    }
}

fn encrypt(doc: &mut Document, user_password: &str, owner_password: &str) {
    let sealed_owner = owner_entry(user_password, owner_password);

    let mut key_input = padded(user_password);
    key_input.extend_from_slice(&sealed_owner);
    key_input.extend_from_slice(&(PERMISSIONS as u32).to_le_bytes());
    key_input.extend_from_slice(FILE_ID);
    let key = stretched_digest(&key_input);

    let mut user_entry = rc4_rounds(&key, &digest(&[&PASSWORD_PAD[..], &FILE_ID[..]].concat()));
    user_entry.extend_from_slice(&PASSWORD_PAD[..16]);

    let info_id = doc.trailer.get(b"Info").and_then(Object::as_reference).ok();
    for (&id, object) in doc.objects.iter_mut() {
        let id_key = object_key(&key, id);
        match object {
            Object::Stream(stream) => {
                let sealed = rc4(&id_key, &stream.content);
                stream.set_content(sealed);
            }
            Object::String(content, _) => *content = rc4(&id_key, content),
            Object::Dictionary(info) if Some(id) == info_id => {
                for (_, value) in info.iter_mut() {
                    if let Object::String(content, _) = value {
                        *content = rc4(&id_key, content);
                    }
                }
            }
            _ => {}
        }
    }

    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 4,
        "R" => 4,
        "Length" => 128,
        "CF" => dictionary! {
            "StdCF" => dictionary! { "CFM" => "V2", "Length" => 16, "AuthEvent" => "DocOpen" },
        },
        "StmF" => "StdCF",
        "StrF" => "StdCF",
        "O" => Object::String(sealed_owner, StringFormat::Hexadecimal),
        "U" => Object::String(user_entry, StringFormat::Hexadecimal),
        "P" => PERMISSIONS as i64,
    });
    doc.trailer.set("Encrypt", encrypt_id);
    doc.trailer.set(
        "ID",
        vec![
            Object::String(FILE_ID.to_vec(), StringFormat::Hexadecimal),
            Object::String(FILE_ID.to_vec(), StringFormat::Hexadecimal),
        ],
    );
}

/// The `/O` entry: the padded user password sealed with the owner key.
fn owner_entry(user_password: &str, owner_password: &str) -> Vec<u8> {
    let owner = if owner_password.is_empty() { user_password } else { owner_password };
    let owner_key = stretched_digest(&padded(owner));
    rc4_rounds(&owner_key, &padded(user_password))
}

fn padded(password: &str) -> Vec<u8> {
    let bytes = &password.as_bytes()[..password.len().min(32)];
    [bytes, &PASSWORD_PAD[..32 - bytes.len()]].concat()
}

fn digest(data: &[u8]) -> Vec<u8> {
    Md5::digest(data).to_vec()
}

/// MD5 followed by 50 re-hashes of the leading key bytes.
fn stretched_digest(data: &[u8]) -> Vec<u8> {
    (0..50).fold(digest(data), |key, _| digest(&key[..KEY_LEN]))
}

fn object_key(key: &[u8], (number, generation): ObjectId) -> Vec<u8> {
    let mut input = key.to_vec();
    input.extend_from_slice(&number.to_le_bytes()[..3]);
    input.extend_from_slice(&generation.to_le_bytes()[..2]);
    let mut object_key = digest(&input);
    object_key.truncate((key.len() + 5).min(16));
    object_key
}

/// Encrypts with `key`, then 19 more passes keyed by `key XOR round`.
fn rc4_rounds(key: &[u8], data: &[u8]) -> Vec<u8> {
    (1..=19u8).fold(rc4(key, data), |sealed, round| {
        let round_key: Vec<u8> = key.iter().map(|byte| byte ^ round).collect();
        rc4(&round_key, &sealed)
    })
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut state: Vec<u8> = (0..=255).collect();
    let mut j = 0usize;
    for i in 0..256 {
        j = (j + state[i] as usize + key[i % key.len()] as usize) & 0xFF;
        state.swap(i, j);
    }

    let (mut i, mut j) = (0usize, 0usize);
    data.iter()
        .map(|byte| {
            i = (i + 1) & 0xFF;
            j = (j + state[i] as usize) & 0xFF;
            state.swap(i, j);
            byte ^ state[(state[i] as usize + state[j] as usize) & 0xFF]
        })
        .collect()
}

/// Bytes that carry an `/Encrypt` entry but cannot be decrypted.
pub fn encrypted_marker_pdf() -> &'static [u8] {
    b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Encrypt 2 0 R >>\nendobj\n\
      trailer\n<< /Root 1 0 R >>\n%%EOF\n"
}
