//! End-of-session conversion of plain-text channel logs into NPY arrays.
//!
//! Output is NPY format version 1.0, one-dimensional `<f8` (little-endian
//! f64), which downstream analysis tooling loads directly.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Convert a one-float-per-line text log into an NPY array file. Returns the
/// number of values written.
pub fn text_log_to_npy(txt: &Path, npy: &Path) -> io::Result<usize> {
    let contents = std::fs::read_to_string(txt)?;
    let mut values = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v: f64 = line.parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}:{}: not a number: {:?}", txt.display(), lineno + 1, line),
            )
        })?;
        values.push(v);
    }

    let mut out = BufWriter::new(File::create(npy)?);
    write_header(&mut out, values.len())?;
    for v in &values {
        out.write_f64::<LittleEndian>(*v)?;
    }
    out.flush()?;
    Ok(values.len())
}

fn write_header<W: Write>(out: &mut W, len: usize) -> io::Result<()> {
    let dict = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({},), }}",
        len
    );
    // Total header (magic + version + length field + dict) padded to a
    // 64-byte boundary, dict terminated by a newline.
    let unpadded = NPY_MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    out.write_all(NPY_MAGIC)?;
    out.write_all(&[1, 0])?;
    out.write_u16::<LittleEndian>((dict.len() + padding + 1) as u16)?;
    out.write_all(dict.as_bytes())?;
    out.write_all(&vec![b' '; padding])?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Read back a 1-D `<f8` NPY file written by [`text_log_to_npy`].
pub fn read_npy_f64(npy: &Path) -> io::Result<Vec<f64>> {
    let mut f = File::open(npy)?;
    let mut magic = [0u8; 6];
    f.read_exact(&mut magic)?;
    if &magic != NPY_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "not an NPY file"));
    }
    let mut version = [0u8; 2];
    f.read_exact(&mut version)?;
    let header_len = f.read_u16::<LittleEndian>()? as usize;
    let mut header = vec![0u8; header_len];
    f.read_exact(&mut header)?;

    let mut values = Vec::new();
    loop {
        match f.read_f64::<LittleEndian>() {
            Ok(v) => values.push(v),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_text_log_to_npy() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("oxygen.txt");
        let npy = dir.path().join("oxygen.npy");
        std::fs::write(&txt, "33.0\n-1\n34.5\n").unwrap();

        let n = text_log_to_npy(&txt, &npy).unwrap();
        assert_eq!(n, 3);
        assert_eq!(read_npy_f64(&npy).unwrap(), vec![33.0, -1.0, 34.5]);
    }

    #[test]
    fn empty_log_becomes_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("dose.txt");
        let npy = dir.path().join("dose.npy");
        std::fs::write(&txt, "").unwrap();

        assert_eq!(text_log_to_npy(&txt, &npy).unwrap(), 0);
        assert!(read_npy_f64(&npy).unwrap().is_empty());
    }

    #[test]
    fn malformed_line_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("ga-mac.txt");
        std::fs::write(&txt, "0.8\nnot-a-number\n").unwrap();

        let err = text_log_to_npy(&txt, &dir.path().join("ga-mac.npy")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn header_is_64_byte_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("timestamps.txt");
        let npy = dir.path().join("timestamps.npy");
        std::fs::write(&txt, "1.5\n").unwrap();
        text_log_to_npy(&txt, &npy).unwrap();

        let bytes = std::fs::read(&npy).unwrap();
        // One f64 payload after a 64-byte-aligned header.
        assert_eq!(bytes.len() % 64, 8);
        assert_eq!(&bytes[..6], NPY_MAGIC);
    }
}
