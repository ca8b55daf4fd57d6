//! Android binary XML decoding
//!
//! `AndroidManifest.xml` inside an APK is stored in the resource table's
//! binary XML encoding, not text. This module decodes the chunk stream far
//! enough to recover what the run pipeline needs: the package id, version
//! fields, and declared activities with their intent filters.

use thiserror::Error;

const CHUNK_XML: u16 = 0x0003;
const CHUNK_STRING_POOL: u16 = 0x0001;
const CHUNK_START_ELEMENT: u16 = 0x0102;
const CHUNK_END_ELEMENT: u16 = 0x0103;

const UTF8_FLAG: u32 = 1 << 8;
const NO_ENTRY: u32 = 0xFFFF_FFFF;

const TYPE_STRING: u8 = 0x03;
const TYPE_INT_DEC: u8 = 0x10;
const TYPE_INT_HEX: u8 = 0x11;

/// `<action android:name>` marking an entry point.
pub const ACTION_MAIN: &str = "android.intent.action.MAIN";
/// `<category android:name>` marking a launcher entry.
pub const CATEGORY_LAUNCHER: &str = "android.intent.category.LAUNCHER";

/// Errors from the binary XML decoder.
#[derive(Debug, Error)]
pub enum AxmlError {
    /// The payload does not start with the binary XML chunk signature.
    #[error("not Android binary XML")]
    NotBinaryXml,
    /// A chunk or string reaches past the end of the payload.
    #[error("truncated binary XML at offset {0}")]
    Truncated(usize),
    /// A string pool index out of bounds.
    #[error("string index {0} out of bounds")]
    BadStringIndex(u32),
    /// An element chunk appeared before any string pool.
    #[error("missing string pool")]
    MissingStringPool,
}

/// One `<intent-filter>` block.
#[derive(Debug, Clone, Default)]
pub struct IntentFilter {
    /// `<action android:name>` values.
    pub actions: Vec<String>,
    /// `<category android:name>` values.
    pub categories: Vec<String>,
}

impl IntentFilter {
    /// True when this single filter marks a launchable entry point.
    pub fn is_launcher(&self) -> bool {
        self.actions.iter().any(|a| a == ACTION_MAIN)
            && self.categories.iter().any(|c| c == CATEGORY_LAUNCHER)
    }
}

/// An `<activity>` or `<activity-alias>` declaration.
#[derive(Debug, Clone)]
pub struct ActivityDecl {
    /// Component name as declared (`android:name`).
    pub name: String,
    /// Intent filters on the component, in document order.
    pub filters: Vec<IntentFilter>,
}

/// Manifest details decoded from `AndroidManifest.xml`.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Application id (`package` on `<manifest>`).
    pub package: Option<String>,
    /// `android:versionCode`.
    pub version_code: Option<u32>,
    /// `android:versionName`.
    pub version_name: Option<String>,
    /// Declared activities and aliases, in document order.
    pub activities: Vec<ActivityDecl>,
}

impl Manifest {
    /// The first declared component carrying a MAIN action and a LAUNCHER
    /// category in the same intent filter.
    pub fn launch_activity(&self) -> Option<&str> {
        self.activities
            .iter()
            .find(|activity| activity.filters.iter().any(IntentFilter::is_launcher))
            .map(|activity| activity.name.as_str())
    }
}

/// Decodes a binary `AndroidManifest.xml` payload.
pub fn parse_manifest(data: &[u8]) -> Result<Manifest, AxmlError> {
    let mut header = Reader::new(data);
    if header.u16()? != CHUNK_XML {
        return Err(AxmlError::NotBinaryXml);
    }
    let header_size = header.u16()? as usize;
    let total_size = header.u32()? as usize;
    if header_size < 8 || total_size > data.len() {
        return Err(AxmlError::Truncated(0));
    }

    let mut pool: Option<StringPool> = None;
    let mut builder = ManifestBuilder::default();
    let mut offset = header_size;
    while offset + 8 <= total_size {
        let mut chunk_header = Reader::at(data, offset);
        let chunk_type = chunk_header.u16()?;
        let _ = chunk_header.u16()?;
        let chunk_size = chunk_header.u32()? as usize;
        if chunk_size < 8 || offset + chunk_size > total_size {
            return Err(AxmlError::Truncated(offset));
        }
        let chunk = &data[offset..offset + chunk_size];
        match chunk_type {
            CHUNK_STRING_POOL => pool = Some(parse_string_pool(chunk)?),
            CHUNK_START_ELEMENT => {
                let pool = pool.as_ref().ok_or(AxmlError::MissingStringPool)?;
                builder.open(chunk, pool)?;
            }
            CHUNK_END_ELEMENT => builder.close(),
            // Namespace, CDATA and resource map chunks carry nothing we need.
            _ => {}
        }
        offset += chunk_size;
    }
    Ok(builder.finish())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], AxmlError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(AxmlError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, AxmlError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, AxmlError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32, AxmlError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    fn get(&self, index: u32) -> Result<&str, AxmlError> {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .ok_or(AxmlError::BadStringIndex(index))
    }

    fn get_optional(&self, index: u32) -> Option<&str> {
        if index == NO_ENTRY {
            return None;
        }
        self.strings.get(index as usize).map(String::as_str)
    }
}

fn parse_string_pool(chunk: &[u8]) -> Result<StringPool, AxmlError> {
    let mut reader = Reader::at(chunk, 8);
    let string_count = reader.u32()? as usize;
    let _style_count = reader.u32()?;
    let flags = reader.u32()?;
    let strings_start = reader.u32()? as usize;
    let _styles_start = reader.u32()?;
    let utf8 = flags & UTF8_FLAG != 0;

    // The declared count is header data; reserve only what the chunk can
    // actually hold (4 bytes per offset). An overlong count still errors
    // below when the offset reads run out of chunk.
    let capacity = string_count.min(chunk.len().saturating_sub(reader.pos) / 4);
    let mut offsets = Vec::with_capacity(capacity);
    for _ in 0..string_count {
        offsets.push(reader.u32()? as usize);
    }

    let mut strings = Vec::with_capacity(offsets.len());
    for offset in offsets {
        let start = strings_start
            .checked_add(offset)
            .ok_or(AxmlError::Truncated(strings_start))?;
        strings.push(if utf8 {
            read_utf8(chunk, start)?
        } else {
            read_utf16(chunk, start)?
        });
    }
    Ok(StringPool { strings })
}

// A UTF-16 entry: u16 length in code units (two words when the high bit
// is set), the units, then a zero terminator.
fn read_utf16(chunk: &[u8], start: usize) -> Result<String, AxmlError> {
    let mut reader = Reader::at(chunk, start);
    let mut len = reader.u16()? as usize;
    if len & 0x8000 != 0 {
        len = ((len & 0x7FFF) << 16) | reader.u16()? as usize;
    }
    let bytes = reader.take(len * 2)?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

// A UTF-8 entry carries two lengths, the character count then the byte
// count, each one byte or two when the high bit is set.
fn read_utf8(chunk: &[u8], start: usize) -> Result<String, AxmlError> {
    let mut reader = Reader::at(chunk, start);
    let _char_len = read_utf8_len(&mut reader)?;
    let byte_len = read_utf8_len(&mut reader)?;
    let bytes = reader.take(byte_len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn read_utf8_len(reader: &mut Reader<'_>) -> Result<usize, AxmlError> {
    let first = reader.u8()? as usize;
    if first & 0x80 != 0 {
        Ok(((first & 0x7F) << 8) | reader.u8()? as usize)
    } else {
        Ok(first)
    }
}

#[derive(Debug)]
struct Attribute {
    raw_value: u32,
    data_type: u8,
    data: u32,
}

impl Attribute {
    fn string_value<'p>(&self, pool: &'p StringPool) -> Option<&'p str> {
        if self.raw_value != NO_ENTRY {
            return pool.get_optional(self.raw_value);
        }
        if self.data_type == TYPE_STRING {
            return pool.get_optional(self.data);
        }
        None
    }

    fn int_value(&self) -> Option<u32> {
        matches!(self.data_type, TYPE_INT_DEC | TYPE_INT_HEX).then_some(self.data)
    }
}

#[derive(Default)]
struct ManifestBuilder {
    manifest: Manifest,
    stack: Vec<String>,
    activity: Option<ActivityDecl>,
    filter: Option<IntentFilter>,
}

impl ManifestBuilder {
    fn open(&mut self, chunk: &[u8], pool: &StringPool) -> Result<(), AxmlError> {
        // Node header is 16 bytes, then the element extension.
        let mut reader = Reader::at(chunk, 16);
        let _ns = reader.u32()?;
        let name_index = reader.u32()?;
        let attribute_start = reader.u16()? as usize;
        let attribute_size = reader.u16()? as usize;
        let attribute_count = reader.u16()? as usize;
        let name = pool.get(name_index)?.to_string();

        let mut attributes = Vec::with_capacity(attribute_count);
        for i in 0..attribute_count {
            let mut attr = Reader::at(chunk, 16 + attribute_start + i * attribute_size);
            let _ns = attr.u32()?;
            let name_index = attr.u32()?;
            let raw_value = attr.u32()?;
            let _size = attr.u16()?;
            let _res0 = attr.u8()?;
            let data_type = attr.u8()?;
            let data = attr.u32()?;
            if let Some(attr_name) = pool.get_optional(name_index) {
                attributes.push((
                    attr_name,
                    Attribute {
                        raw_value,
                        data_type,
                        data,
                    },
                ));
            }
        }
        let string_attr = |wanted: &str| {
            attributes
                .iter()
                .find(|(name, _)| *name == wanted)
                .and_then(|(_, attr)| attr.string_value(pool))
        };
        let int_attr = |wanted: &str| {
            attributes
                .iter()
                .find(|(name, _)| *name == wanted)
                .and_then(|(_, attr)| attr.int_value())
        };

        match name.as_str() {
            "manifest" if self.stack.is_empty() => {
                self.manifest.package = string_attr("package").map(str::to_string);
                self.manifest.version_code = int_attr("versionCode");
                self.manifest.version_name = string_attr("versionName").map(str::to_string);
            }
            "activity" | "activity-alias"
                if self.stack.last().map(String::as_str) == Some("application") =>
            {
                self.activity = string_attr("name").map(|component| ActivityDecl {
                    name: component.to_string(),
                    filters: Vec::new(),
                });
            }
            "intent-filter" if self.activity.is_some() && self.filter.is_none() => {
                self.filter = Some(IntentFilter::default());
            }
            "action" => {
                if let (Some(filter), Some(value)) = (self.filter.as_mut(), string_attr("name")) {
                    filter.actions.push(value.to_string());
                }
            }
            "category" => {
                if let (Some(filter), Some(value)) = (self.filter.as_mut(), string_attr("name")) {
                    filter.categories.push(value.to_string());
                }
            }
            _ => {}
        }
        self.stack.push(name);
        Ok(())
    }

    fn close(&mut self) {
        let Some(name) = self.stack.pop() else {
            return;
        };
        match name.as_str() {
            "intent-filter" => {
                if let (Some(activity), Some(filter)) =
                    (self.activity.as_mut(), self.filter.take())
                {
                    activity.filters.push(filter);
                }
            }
            "activity" | "activity-alias" => {
                if let Some(activity) = self.activity.take() {
                    self.manifest.activities.push(activity);
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Manifest {
        self.manifest
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-assembled binary XML documents.

    pub(crate) enum Value {
        /// String attribute with the raw value set.
        Str(u32),
        /// String attribute carried only in the typed value.
        TypedStr(u32),
        /// Decimal integer attribute.
        Int(u32),
    }

    pub(crate) fn le16(v: u16) -> [u8; 2] {
        v.to_le_bytes()
    }

    pub(crate) fn le32(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    pub(crate) fn pool_chunk(count: usize, flags: u32, offsets: &[u32], blob: &[u8]) -> Vec<u8> {
        let header_size = 28u32;
        let strings_start = header_size + 4 * count as u32;
        let mut out = Vec::new();
        out.extend_from_slice(&le16(0x0001));
        out.extend_from_slice(&le16(header_size as u16));
        out.extend_from_slice(&le32(strings_start + blob.len() as u32));
        out.extend_from_slice(&le32(count as u32));
        out.extend_from_slice(&le32(0));
        out.extend_from_slice(&le32(flags));
        out.extend_from_slice(&le32(strings_start));
        out.extend_from_slice(&le32(0));
        for offset in offsets {
            out.extend_from_slice(&le32(*offset));
        }
        out.extend_from_slice(blob);
        out
    }

    pub(crate) fn string_pool(strings: &[&str]) -> Vec<u8> {
        let mut offsets = Vec::new();
        let mut blob = Vec::new();
        for s in strings {
            offsets.push(blob.len() as u32);
            let units: Vec<u16> = s.encode_utf16().collect();
            blob.extend_from_slice(&le16(units.len() as u16));
            for unit in units {
                blob.extend_from_slice(&le16(unit));
            }
            blob.extend_from_slice(&le16(0));
        }
        pool_chunk(strings.len(), 0, &offsets, &blob)
    }

    pub(crate) fn utf8_string_pool(strings: &[&str]) -> Vec<u8> {
        let mut offsets = Vec::new();
        let mut blob = Vec::new();
        for s in strings {
            offsets.push(blob.len() as u32);
            blob.push(s.encode_utf16().count() as u8);
            blob.push(s.len() as u8);
            blob.extend_from_slice(s.as_bytes());
            blob.push(0);
        }
        pool_chunk(strings.len(), 1 << 8, &offsets, &blob)
    }

    pub(crate) fn start_element(name: u32, attrs: &[(u32, Value)]) -> Vec<u8> {
        let size = 16 + 20 + attrs.len() * 20;
        let mut out = Vec::new();
        out.extend_from_slice(&le16(0x0102));
        out.extend_from_slice(&le16(16));
        out.extend_from_slice(&le32(size as u32));
        out.extend_from_slice(&le32(0)); // line
        out.extend_from_slice(&le32(0xFFFF_FFFF)); // comment
        out.extend_from_slice(&le32(0xFFFF_FFFF)); // ns
        out.extend_from_slice(&le32(name));
        out.extend_from_slice(&le16(20)); // attributeStart
        out.extend_from_slice(&le16(20)); // attributeSize
        out.extend_from_slice(&le16(attrs.len() as u16));
        out.extend_from_slice(&le16(0)); // id
        out.extend_from_slice(&le16(0)); // class
        out.extend_from_slice(&le16(0)); // style
        for (attr_name, value) in attrs {
            out.extend_from_slice(&le32(0xFFFF_FFFF)); // ns
            out.extend_from_slice(&le32(*attr_name));
            let (raw, data_type, data) = match value {
                Value::Str(index) => (*index, 0x03, *index),
                Value::TypedStr(index) => (0xFFFF_FFFF, 0x03, *index),
                Value::Int(v) => (0xFFFF_FFFF, 0x10, *v),
            };
            out.extend_from_slice(&le32(raw));
            out.extend_from_slice(&le16(8)); // typed value size
            out.push(0); // res0
            out.push(data_type);
            out.extend_from_slice(&le32(data));
        }
        out
    }

    pub(crate) fn end_element(name: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&le16(0x0103));
        out.extend_from_slice(&le16(16));
        out.extend_from_slice(&le32(24));
        out.extend_from_slice(&le32(0));
        out.extend_from_slice(&le32(0xFFFF_FFFF));
        out.extend_from_slice(&le32(0xFFFF_FFFF));
        out.extend_from_slice(&le32(name));
        out
    }

    pub(crate) fn document(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = Vec::new();
        out.extend_from_slice(&le16(0x0003));
        out.extend_from_slice(&le16(8));
        out.extend_from_slice(&le32(8 + body.len() as u32));
        out.extend_from_slice(&body);
        out
    }

    const MANIFEST: u32 = 0;
    const PACKAGE: u32 = 1;
    const VERSION_CODE: u32 = 2;
    const VERSION_NAME: u32 = 3;
    const APPLICATION: u32 = 4;
    const ACTIVITY: u32 = 5;
    const INTENT_FILTER: u32 = 7;
    const ACTION: u32 = 8;
    const CATEGORY: u32 = 9;
    const NAME: u32 = 10;

    pub(crate) const MANIFEST_STRINGS: &[&str] = &[
        "manifest",
        "package",
        "versionCode",
        "versionName",
        "application",
        "activity",
        "activity-alias",
        "intent-filter",
        "action",
        "category",
        "name",
        "io.example.app",
        "1.2.3",
        ".MainActivity",
        "android.intent.action.MAIN",
        "android.intent.category.LAUNCHER",
        ".SettingsActivity",
        "android.intent.action.VIEW",
    ];

    /// Two activities; only the second carries a MAIN/LAUNCHER filter.
    pub(crate) fn manifest_document() -> Vec<u8> {
        document(&[
            string_pool(MANIFEST_STRINGS),
            start_element(
                MANIFEST,
                &[
                    (PACKAGE, Value::Str(11)),
                    (VERSION_CODE, Value::Int(42)),
                    (VERSION_NAME, Value::TypedStr(12)),
                ],
            ),
            start_element(APPLICATION, &[]),
            start_element(ACTIVITY, &[(NAME, Value::Str(16))]),
            start_element(INTENT_FILTER, &[]),
            start_element(ACTION, &[(NAME, Value::Str(17))]),
            end_element(ACTION),
            end_element(INTENT_FILTER),
            end_element(ACTIVITY),
            start_element(ACTIVITY, &[(NAME, Value::Str(13))]),
            start_element(INTENT_FILTER, &[]),
            start_element(ACTION, &[(NAME, Value::Str(14))]),
            end_element(ACTION),
            start_element(CATEGORY, &[(NAME, Value::Str(15))]),
            end_element(CATEGORY),
            end_element(INTENT_FILTER),
            end_element(ACTIVITY),
            end_element(APPLICATION),
            end_element(MANIFEST),
        ])
    }
}
