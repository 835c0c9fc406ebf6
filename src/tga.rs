//! Reader/writer for uncompressed true-color TARGA files.
//!
//! The format is the 18-byte header followed by 24-bit BGR triples,
//! bottom-up (the first pixel on disk is the image's lower left). Pixels
//! pass through an approximate square-law gamma by default: encode
//! `√clamp01(c)·255`, decode `(u/255)²`. Tests and callers that need a
//! lossless round trip pass `gamma = false`.

use crate::math::{clamp01, Color};
use crate::scene::Surface;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TgaError {
    #[error("error reading file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error writing file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error reading file {path}: unsupported TARGA format")]
    Unsupported { path: PathBuf },
}

const IMAGE_TYPE_UNCOMPRESSED_TRUE_COLOR: u8 = 2;
const HEADER_SIZE: usize = 18;

#[inline]
pub fn color_from_rgb24(r: u8, g: u8, b: u8, gamma: bool) -> Color {
    if gamma {
        Color::new(
            (r as f32 * r as f32) / 65025.0,
            (g as f32 * g as f32) / 65025.0,
            (b as f32 * b as f32) / 65025.0,
        )
    } else {
        Color::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }
}

#[inline]
pub fn u8_from_component(c: f32, gamma: bool) -> u8 {
    let c = clamp01(c);
    if gamma {
        (c.sqrt() * 255.0) as u8
    } else {
        (c * 255.0) as u8
    }
}

/// Loads a TGA file into a linear-RGB surface.
pub fn load_tga(path: &Path, gamma: bool) -> Result<Surface, TgaError> {
    let read_err = |source| TgaError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(read_err)?;
    let mut reader = BufReader::new(file);

    let id_length = reader.read_u8().map_err(read_err)?;
    let color_map_type = reader.read_u8().map_err(read_err)?;
    let image_type = reader.read_u8().map_err(read_err)?;
    let mut color_map_spec = [0u8; 5];
    reader.read_exact(&mut color_map_spec).map_err(read_err)?;
    let _x_origin = reader.read_u16::<LittleEndian>().map_err(read_err)?;
    let _y_origin = reader.read_u16::<LittleEndian>().map_err(read_err)?;
    let width = reader.read_u16::<LittleEndian>().map_err(read_err)?;
    let height = reader.read_u16::<LittleEndian>().map_err(read_err)?;
    let _pixel_depth = reader.read_u8().map_err(read_err)?;
    let _descriptor = reader.read_u8().map_err(read_err)?;

    if id_length != 0 || color_map_type != 0 || image_type != IMAGE_TYPE_UNCOMPRESSED_TRUE_COLOR {
        return Err(TgaError::Unsupported {
            path: path.to_path_buf(),
        });
    }

    let mut surface = Surface::new(width as u32, height as u32);
    let mut data = vec![0u8; width as usize * height as usize * 3];
    reader.read_exact(&mut data).map_err(read_err)?;

    for (pixel, bgr) in surface.pixels.iter_mut().zip(data.chunks_exact(3)) {
        *pixel = color_from_rgb24(bgr[2], bgr[1], bgr[0], gamma);
    }

    Ok(surface)
}

/// Writes a surface as an uncompressed true-color TGA.
pub fn write_tga(surface: &Surface, path: &Path, gamma: bool) -> Result<(), TgaError> {
    let write_err = |source| TgaError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);

    writer.write_u8(0).map_err(write_err)?; // id length
    writer.write_u8(0).map_err(write_err)?; // no color map
    writer
        .write_u8(IMAGE_TYPE_UNCOMPRESSED_TRUE_COLOR)
        .map_err(write_err)?;
    writer.write_all(&[0u8; 5]).map_err(write_err)?; // color map spec
    writer.write_u16::<LittleEndian>(0).map_err(write_err)?; // x origin
    writer.write_u16::<LittleEndian>(0).map_err(write_err)?; // y origin
    writer
        .write_u16::<LittleEndian>(surface.width as u16)
        .map_err(write_err)?;
    writer
        .write_u16::<LittleEndian>(surface.height as u16)
        .map_err(write_err)?;
    writer.write_u8(24).map_err(write_err)?; // pixel depth
    writer.write_u8(0).map_err(write_err)?; // descriptor

    let mut data = Vec::with_capacity(surface.pixels.len() * 3);
    for pixel in &surface.pixels {
        data.push(u8_from_component(pixel.z, gamma));
        data.push(u8_from_component(pixel.y, gamma));
        data.push(u8_from_component(pixel.x, gamma));
    }
    writer.write_all(&data).map_err(write_err)?;
    writer.flush().map_err(write_err)?;

    Ok(())
}
