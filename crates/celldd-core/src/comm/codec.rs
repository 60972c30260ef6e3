//! Binary layout of exchanged frames.
//!
//! All integers and floats are little-endian with no padding. A particle record is
//! `id:u64, position:3×f64, image:3×i32, velocity:3×f64, force:3×f64, type:u32, mass:f64,
//! charge:f64, n_bonds:u32` followed by `n_bonds` bonds of `type:u32, n_partners:u32,
//! partners:n_partners×u64`. A ghost record is `id:u64, type:u32, position:3×f64`. Count
//! headers are plain `u64` sequences.

use super::error::CommError;
use super::transport::Tag;
use crate::core::models::ids::ParticleId;
use crate::core::models::particle::{Bond, GhostRecord, Particle};
use nalgebra::{Point3, Vector3};

pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_point(buf: &mut Vec<u8>, p: &Point3<f64>) {
    for axis in 0..3 {
        write_f64(buf, p[axis]);
    }
}

pub fn write_vector(buf: &mut Vec<u8>, v: &Vector3<f64>) {
    for axis in 0..3 {
        write_f64(buf, v[axis]);
    }
}

/// Cursor over a received frame; every read past the end is a malformed-frame error.
#[derive(Debug)]
pub struct FrameReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    tag: Tag,
}

impl<'a> FrameReader<'a> {
    pub fn new(tag: Tag, bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            tag,
        }
    }

    fn malformed(&self, detail: String) -> CommError {
        CommError::MalformedFrame {
            tag: self.tag,
            detail,
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], CommError> {
        let end = self
            .offset
            .checked_add(N)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                self.malformed(format!(
                    "needed {N} byte(s) at offset {}, frame holds {}",
                    self.offset,
                    self.bytes.len()
                ))
            })?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.offset..end]);
        self.offset = end;
        Ok(out)
    }

    pub fn read_u32(&mut self) -> Result<u32, CommError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CommError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CommError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, CommError> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    pub fn read_point(&mut self) -> Result<Point3<f64>, CommError> {
        Ok(Point3::new(self.read_f64()?, self.read_f64()?, self.read_f64()?))
    }

    pub fn read_vector(&mut self) -> Result<Vector3<f64>, CommError> {
        Ok(Vector3::new(self.read_f64()?, self.read_f64()?, self.read_f64()?))
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Fails if unread bytes are left in the frame.
    pub fn finish(self) -> Result<(), CommError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(self.malformed(format!("{n} trailing byte(s)"))),
        }
    }
}

pub fn encode_particle(buf: &mut Vec<u8>, p: &Particle) {
    write_u64(buf, p.id.0);
    write_point(buf, &p.position);
    for image in p.image {
        write_i32(buf, image);
    }
    write_vector(buf, &p.velocity);
    write_vector(buf, &p.force);
    write_u32(buf, p.type_id);
    write_f64(buf, p.mass);
    write_f64(buf, p.charge);
    write_u32(buf, p.bonds.len() as u32);
    for bond in &p.bonds {
        write_u32(buf, bond.bond_type);
        write_u32(buf, bond.partners.len() as u32);
        for partner in &bond.partners {
            write_u64(buf, partner.0);
        }
    }
}

pub fn decode_particle(reader: &mut FrameReader<'_>) -> Result<Particle, CommError> {
    let id = ParticleId(reader.read_u64()?);
    let position = reader.read_point()?;
    let image = [reader.read_i32()?, reader.read_i32()?, reader.read_i32()?];
    let velocity = reader.read_vector()?;
    let force = reader.read_vector()?;
    let type_id = reader.read_u32()?;
    let mass = reader.read_f64()?;
    let charge = reader.read_f64()?;
    let n_bonds = reader.read_u32()? as usize;
    // Counts come off the wire; capacity never exceeds what the frame can hold.
    let mut bonds = Vec::with_capacity(n_bonds.min(reader.remaining() / 8));
    for _ in 0..n_bonds {
        let bond_type = reader.read_u32()?;
        let n_partners = reader.read_u32()? as usize;
        let mut partners = Vec::with_capacity(n_partners.min(reader.remaining() / 8));
        for _ in 0..n_partners {
            partners.push(ParticleId(reader.read_u64()?));
        }
        bonds.push(Bond::new(bond_type, partners));
    }
    Ok(Particle {
        id,
        position,
        image,
        velocity,
        force,
        bonds,
        type_id,
        mass,
        charge,
    })
}

pub fn encode_ghost(buf: &mut Vec<u8>, record: &GhostRecord) {
    write_u64(buf, record.id.0);
    write_u32(buf, record.type_id);
    write_point(buf, &record.position);
}

pub fn decode_ghost(reader: &mut FrameReader<'_>) -> Result<GhostRecord, CommError> {
    Ok(GhostRecord {
        id: ParticleId(reader.read_u64()?),
        type_id: reader.read_u32()?,
        position: reader.read_point()?,
    })
}

pub fn encode_counts(counts: &[u64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(counts.len() * 8);
    for &count in counts {
        write_u64(&mut buf, count);
    }
    buf
}

pub fn decode_counts(tag: Tag, bytes: &[u8]) -> Result<Vec<u64>, CommError> {
    if bytes.len() % 8 != 0 {
        return Err(CommError::MalformedFrame {
            tag,
            detail: format!("count header of {} byte(s) is not a multiple of 8", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_particle() -> Particle {
        let mut p = Particle::new(77, Point3::new(1.5, -2.25, 3.0))
            .with_type(3)
            .with_velocity(Vector3::new(0.1, 0.2, 0.3))
            .with_bond(Bond::new(2, vec![ParticleId(5), ParticleId(6)]))
            .with_bond(Bond::new(9, Vec::new()));
        p.image = [1, -2, 0];
        p.force = Vector3::new(-1.0, 0.0, 4.0);
        p.mass = 2.5;
        p.charge = -1.0;
        p
    }

    #[test]
    fn particle_survives_the_wire_with_bonds() {
        let p = sample_particle();
        let mut buf = Vec::new();
        encode_particle(&mut buf, &p);
        let mut reader = FrameReader::new(Tag::Particles, &buf);
        assert_eq!(decode_particle(&mut reader).unwrap(), p);
        reader.finish().unwrap();
    }

    #[test]
    fn truncated_particle_is_malformed() {
        let mut buf = Vec::new();
        encode_particle(&mut buf, &sample_particle());
        buf.truncate(buf.len() - 3);
        let mut reader = FrameReader::new(Tag::Particles, &buf);
        assert!(matches!(
            decode_particle(&mut reader),
            Err(CommError::MalformedFrame { tag: Tag::Particles, .. })
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut buf = Vec::new();
        encode_ghost(&mut buf, &sample_particle().reduced());
        buf.push(0);
        let mut reader = FrameReader::new(Tag::Ghosts, &buf);
        decode_ghost(&mut reader).unwrap();
        assert!(reader.finish().is_err());
    }

    #[test]
    fn count_headers_require_whole_words() {
        assert_eq!(decode_counts(Tag::Ghosts, &encode_counts(&[3, 0, 12])).unwrap(), vec![3, 0, 12]);
        assert!(decode_counts(Tag::Ghosts, &[0u8; 7]).is_err());
        assert!(decode_counts(Tag::Ghosts, &[]).unwrap().is_empty());
    }
}
