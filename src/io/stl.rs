//! Binary STL input.
//!
//! Layout: an 80-byte header (ignored), a little-endian u32 triangle count,
//! then 50 bytes per triangle: 12 f32 values (normal, vertex A, vertex B,
//! vertex C) and a 2-byte attribute (ignored). Floats are promoted to f64
//! on load. A truncated or inconsistent file is rejected without yielding
//! a partial triangle list.

use crate::error::SimError;
use crate::geom::triangle::Triangle;
use crate::{Point, Vector};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const HEADER_LEN: usize = 80;
const RECORD_LEN: u64 = 50;

fn io_error(path: &Path, source: std::io::Error) -> SimError {
    SimError::InputIo {
        path: path.to_path_buf(),
        source,
    }
}

fn malformed(path: &Path, reason: impl Into<String>) -> SimError {
    SimError::MalformedStl {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_f32(bytes: &[u8], offset: usize) -> f64 {
    f32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]) as f64
}

/// Reads triangles from a binary STL file.
///
/// The triangle count is parsed as unsigned and validated against the file
/// size before any record is read. The stored facet normal is kept; when it
/// is degenerate the normal is recomputed from the vertex winding.
pub fn read_stl_binary(path: &Path) -> Result<Vec<Triangle>, SimError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let file_len = file.metadata().map_err(|e| io_error(path, e))?.len();
    let mut reader = BufReader::new(file);

    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .map_err(|_| malformed(path, "file shorter than the 80-byte header"))?;

    let mut count_bytes = [0u8; 4];
    reader
        .read_exact(&mut count_bytes)
        .map_err(|_| malformed(path, "missing triangle count"))?;
    let count = u32::from_le_bytes(count_bytes);

    let remaining = file_len.saturating_sub((HEADER_LEN + 4) as u64);
    if u64::from(count) * RECORD_LEN > remaining {
        return Err(malformed(
            path,
            format!("triangle count {count} exceeds the remaining file size"),
        ));
    }

    let mut triangles = Vec::with_capacity(count as usize);
    let mut record = [0u8; RECORD_LEN as usize];
    for i in 0..count {
        reader
            .read_exact(&mut record)
            .map_err(|e| io_error(path, e))?;

        let normal = Vector::new(
            read_f32(&record, 0),
            read_f32(&record, 4),
            read_f32(&record, 8),
        );
        let a = Point::new(
            read_f32(&record, 12),
            read_f32(&record, 16),
            read_f32(&record, 20),
        );
        let b = Point::new(
            read_f32(&record, 24),
            read_f32(&record, 28),
            read_f32(&record, 32),
        );
        let c = Point::new(
            read_f32(&record, 36),
            read_f32(&record, 40),
            read_f32(&record, 44),
        );
        // Trailing 2 attribute bytes are ignored

        let triangle = Triangle::new(a, b, c, normal)
            .ok_or_else(|| malformed(path, format!("degenerate facet {i}")))?;
        triangles.push(triangle);
    }

    Ok(triangles)
}

/// Writes triangles to a binary STL file.
pub fn write_stl_binary(path: &Path, triangles: &[Triangle]) -> Result<(), SimError> {
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut writer = BufWriter::new(file);

    let mut write_all = |bytes: &[u8]| writer.write_all(bytes).map_err(|e| io_error(path, e));

    let header = [0u8; HEADER_LEN];
    write_all(&header)?;
    write_all(&(triangles.len() as u32).to_le_bytes())?;

    for tri in triangles {
        for v in [
            tri.normal.dx,
            tri.normal.dy,
            tri.normal.dz,
            tri.a.x,
            tri.a.y,
            tri.a.z,
            tri.b.x,
            tri.b.y,
            tri.b.z,
            tri.c.x,
            tri.c.y,
            tri.c.z,
        ] {
            write_all(&(v as f32).to_le_bytes())?;
        }
        write_all(&0u16.to_le_bytes())?;
    }

    writer.flush().map_err(|e| io_error(path, e))?;
    Ok(())
}
