//! Binary layout of the Mumble Link shared-memory structure.
//!
//! The consumer maps a fixed-size `LinkedMem` struct and polls it. All
//! integers and floats are little-endian; `wchar` strings are UTF-16 on
//! Windows and UTF-32 elsewhere.
//!
//! ```text
//! u32 uiVersion; u32 uiTick;
//! f32 fAvatarPosition[3]; f32 fAvatarFront[3]; f32 fAvatarTop[3];
//! wchar name[256];
//! f32 fCameraPosition[3]; f32 fCameraFront[3]; f32 fCameraTop[3];
//! wchar identity[256];
//! u32 context_len; u8 context[256];
//! wchar description[2048];
//! ```

use crate::error::{Error, Result};
use crate::record::{LinkUpdate, CONTEXT_CAPACITY, LINK_VERSION};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::Vec3;
use std::io::{Cursor, Read, Write};

/// Capacity of `name` in wide characters.
pub const NAME_CAPACITY: usize = 256;
/// Capacity of `identity` in wide characters.
pub const IDENTITY_CAPACITY: usize = 256;
/// Capacity of `description` in wide characters.
pub const DESCRIPTION_CAPACITY: usize = 2048;

pub const DEFAULT_NAME: &str = "Foundry VTT User";
pub const DEFAULT_IDENTITY: &str = "{}";
pub const DEFAULT_DESCRIPTION: &str = "Foundry VTT";

/// Width of the consumer's `wchar_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WideEncoding {
    /// Two-byte units (Windows).
    Utf16,
    /// Four-byte units (Linux, macOS).
    Utf32,
}

impl WideEncoding {
    /// Encoding used by a consumer built for this platform.
    pub fn native() -> Self {
        if cfg!(windows) {
            WideEncoding::Utf16
        } else {
            WideEncoding::Utf32
        }
    }

    /// Bytes per code unit.
    pub fn unit_size(self) -> usize {
        match self {
            WideEncoding::Utf16 => 2,
            WideEncoding::Utf32 => 4,
        }
    }
}

/// Decoded contents of the shared-memory structure.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedMem {
    pub version: u32,
    /// Incremented on every write so the consumer notices fresh data.
    pub tick: u32,
    pub avatar_position: Vec3,
    pub avatar_front: Vec3,
    pub avatar_top: Vec3,
    pub name: String,
    pub camera_position: Vec3,
    pub camera_front: Vec3,
    pub camera_top: Vec3,
    pub identity: String,
    /// At most [`CONTEXT_CAPACITY`] bytes; `context_len` is its length.
    pub context: Vec<u8>,
    pub description: String,
}

impl Default for LinkedMem {
    fn default() -> Self {
        Self {
            version: LINK_VERSION,
            tick: 0,
            avatar_position: Vec3::ZERO,
            avatar_front: Vec3::Z,
            avatar_top: Vec3::Y,
            name: DEFAULT_NAME.to_string(),
            camera_position: Vec3::ZERO,
            camera_front: Vec3::Z,
            camera_top: Vec3::Y,
            identity: DEFAULT_IDENTITY.to_string(),
            context: Vec::new(),
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }
}

impl LinkedMem {
    /// Size of the encoded structure in bytes.
    pub fn size(encoding: WideEncoding) -> usize {
        let header = 2 * 4;
        let vectors = 6 * 3 * 4;
        let wide = (NAME_CAPACITY + IDENTITY_CAPACITY + DESCRIPTION_CAPACITY) * encoding.unit_size();
        let context = 4 + CONTEXT_CAPACITY;
        header + vectors + wide + context
    }

    /// Value written to `context_len`.
    pub fn context_len(&self) -> u32 {
        self.context.len() as u32
    }

    /// Merge the fields present in `update`.
    ///
    /// Camera fields absent from the update follow the avatar fields the
    /// update does carry.
    pub fn apply(&mut self, update: &LinkUpdate) {
        if let Some(version) = update.version {
            self.version = version;
        }

        if let Some(position) = update.avatar_position {
            self.avatar_position = position;
        }
        if let Some(front) = update.avatar_front {
            self.avatar_front = front;
        }
        if let Some(top) = update.avatar_top {
            self.avatar_top = top;
        }

        if let Some(position) = update.camera_position.or(update.avatar_position) {
            self.camera_position = position;
        }
        if let Some(front) = update.camera_front.or(update.avatar_front) {
            self.camera_front = front;
        }
        if let Some(top) = update.camera_top.or(update.avatar_top) {
            self.camera_top = top;
        }

        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(identity) = &update.identity {
            self.identity = identity.clone();
        }
        if let Some(description) = &update.description {
            self.description = description.clone();
        }

        if let Some(context) = &update.context {
            let limit = update
                .context_len
                .map_or(CONTEXT_CAPACITY, |len| len as usize)
                .min(CONTEXT_CAPACITY);
            self.context = context.iter().copied().take(limit).collect();
        }
    }

    /// Bump the tick counter.
    pub fn advance_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    /// Pack into the consumer's binary layout.
    pub fn encode(&self, encoding: WideEncoding) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::size(encoding));

        buf.write_u32::<LittleEndian>(self.version)
            .map_err(layout_err("version"))?;
        buf.write_u32::<LittleEndian>(self.tick)
            .map_err(layout_err("tick"))?;

        write_vec3(&mut buf, self.avatar_position)?;
        write_vec3(&mut buf, self.avatar_front)?;
        write_vec3(&mut buf, self.avatar_top)?;
        write_wide(&mut buf, &self.name, NAME_CAPACITY, encoding)?;

        write_vec3(&mut buf, self.camera_position)?;
        write_vec3(&mut buf, self.camera_front)?;
        write_vec3(&mut buf, self.camera_top)?;
        write_wide(&mut buf, &self.identity, IDENTITY_CAPACITY, encoding)?;

        let context = &self.context[..self.context.len().min(CONTEXT_CAPACITY)];
        buf.write_u32::<LittleEndian>(context.len() as u32)
            .map_err(layout_err("context_len"))?;
        buf.write_all(context).map_err(layout_err("context"))?;
        buf.write_all(&vec![0u8; CONTEXT_CAPACITY - context.len()])
            .map_err(layout_err("context"))?;

        write_wide(&mut buf, &self.description, DESCRIPTION_CAPACITY, encoding)?;

        debug_assert_eq!(buf.len(), Self::size(encoding));
        Ok(buf)
    }

    /// Unpack a frame produced by [`LinkedMem::encode`].
    pub fn decode(bytes: &[u8], encoding: WideEncoding) -> Result<Self> {
        let expected = Self::size(encoding);
        if bytes.len() < expected {
            return Err(Error::Layout(format!(
                "frame is {} bytes, expected {}",
                bytes.len(),
                expected
            )));
        }

        let mut cur = Cursor::new(bytes);
        let version = cur.read_u32::<LittleEndian>()?;
        let tick = cur.read_u32::<LittleEndian>()?;
        let avatar_position = read_vec3(&mut cur)?;
        let avatar_front = read_vec3(&mut cur)?;
        let avatar_top = read_vec3(&mut cur)?;
        let name = read_wide(&mut cur, NAME_CAPACITY, encoding)?;
        let camera_position = read_vec3(&mut cur)?;
        let camera_front = read_vec3(&mut cur)?;
        let camera_top = read_vec3(&mut cur)?;
        let identity = read_wide(&mut cur, IDENTITY_CAPACITY, encoding)?;

        let context_len = cur.read_u32::<LittleEndian>()? as usize;
        let mut context = vec![0u8; CONTEXT_CAPACITY];
        cur.read_exact(&mut context)?;
        context.truncate(context_len.min(CONTEXT_CAPACITY));

        let description = read_wide(&mut cur, DESCRIPTION_CAPACITY, encoding)?;

        Ok(Self {
            version,
            tick,
            avatar_position,
            avatar_front,
            avatar_top,
            name,
            camera_position,
            camera_front,
            camera_top,
            identity,
            context,
            description,
        })
    }
}

fn layout_err(field: &'static str) -> impl Fn(std::io::Error) -> Error {
    move |e| Error::Layout(format!("Failed to write {}: {}", field, e))
}

fn write_vec3(buf: &mut Vec<u8>, v: Vec3) -> Result<()> {
    for c in v.to_array() {
        buf.write_f32::<LittleEndian>(c)
            .map_err(layout_err("vector"))?;
    }
    Ok(())
}

fn read_vec3(cur: &mut Cursor<&[u8]>) -> Result<Vec3> {
    let x = cur.read_f32::<LittleEndian>()?;
    let y = cur.read_f32::<LittleEndian>()?;
    let z = cur.read_f32::<LittleEndian>()?;
    Ok(Vec3::new(x, y, z))
}

/// Write `text` as a NUL-terminated wide string of exactly `capacity` units.
///
/// Characters that do not fit in `capacity - 1` units are dropped whole, so
/// a surrogate pair is never split.
fn write_wide(buf: &mut Vec<u8>, text: &str, capacity: usize, encoding: WideEncoding) -> Result<()> {
    let mut used = 0;
    for ch in text.chars() {
        match encoding {
            WideEncoding::Utf16 => {
                let mut units = [0u16; 2];
                let units = ch.encode_utf16(&mut units);
                if used + units.len() > capacity - 1 {
                    break;
                }
                for unit in units.iter() {
                    buf.write_u16::<LittleEndian>(*unit)
                        .map_err(layout_err("string"))?;
                }
                used += units.len();
            }
            WideEncoding::Utf32 => {
                if used + 1 > capacity - 1 {
                    break;
                }
                buf.write_u32::<LittleEndian>(ch as u32)
                    .map_err(layout_err("string"))?;
                used += 1;
            }
        }
    }

    let padding = (capacity - used) * encoding.unit_size();
    buf.write_all(&vec![0u8; padding])
        .map_err(layout_err("string"))?;
    Ok(())
}

fn read_wide(cur: &mut Cursor<&[u8]>, capacity: usize, encoding: WideEncoding) -> Result<String> {
    match encoding {
        WideEncoding::Utf16 => {
            let mut units = Vec::with_capacity(capacity);
            for _ in 0..capacity {
                units.push(cur.read_u16::<LittleEndian>()?);
            }
            let end = units.iter().position(|&u| u == 0).unwrap_or(capacity);
            Ok(String::from_utf16_lossy(&units[..end]))
        }
        WideEncoding::Utf32 => {
            let mut text = String::new();
            let mut terminated = false;
            for _ in 0..capacity {
                let unit = cur.read_u32::<LittleEndian>()?;
                if unit == 0 {
                    terminated = true;
                }
                if !terminated {
                    text.push(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
            }
            Ok(text)
        }
    }
}
