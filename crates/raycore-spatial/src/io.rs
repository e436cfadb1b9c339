//! Binary persistence for kd-trees.
//!
//! Stream layout, little-endian throughout:
//!
//! ```text
//! header:   magic "RKDT" | version u8 | dimension u8 | item count u32
//!           | max item id u32 | bounds min f64 × dim | bounds max f64 × dim
//! node:     tag u8
//!   leaf (0):      count u32 | item id u32 × count
//!   interior (1):  axis u8 | split f64 | child presence u8 | children…
//! ```
//!
//! The child presence byte has bit 0 set for a lower child and bit 1 for an
//! upper child; at least one must be present. Loading validates every
//! structural field and fails with [`SpatialError::Corrupt`] rather than
//! returning a partially built tree.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::bounds::{Aabb2, Aabb3};
use crate::error::{Result, SpatialError};
use crate::kd2::KdTree2;
use crate::kd3::KdTree3;
use crate::tree::{Axis, KdNode};
use raycore_math::{Point2, Point3};

const MAGIC: [u8; 4] = *b"RKDT";
const VERSION: u8 = 1;

const TAG_LEAF: u8 = 0;
const TAG_INTERIOR: u8 = 1;

const PRESENT_LOWER: u8 = 0b01;
const PRESENT_UPPER: u8 = 0b10;

/// Recursion limit while decoding; a valid tree is never remotely this deep,
/// a crafted stream could otherwise exhaust the stack.
const MAX_STREAM_DEPTH: usize = 512;

impl KdTree3 {
    /// Serialize the tree to a binary stream.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_header(writer, 3, self.item_count, max_item_id(&self.root))?;
        for v in [
            self.bounds.min.x,
            self.bounds.min.y,
            self.bounds.min.z,
            self.bounds.max.x,
            self.bounds.max.y,
            self.bounds.max.z,
        ] {
            write_f64(writer, v)?;
        }
        write_node(writer, &self.root)
    }

    /// Deserialize a tree previously written with [`KdTree3::save`].
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let (item_count, max_id) = read_header(reader, 3)?;
        let min = Point3::new(read_f64(reader)?, read_f64(reader)?, read_f64(reader)?);
        let max = Point3::new(read_f64(reader)?, read_f64(reader)?, read_f64(reader)?);
        let root = read_node(reader, 3, item_count, max_id, 0)?;
        Ok(Self {
            root,
            bounds: Aabb3::new(min, max),
            item_count,
        })
    }

    /// Serialize the tree to a file, created or truncated.
    pub fn save_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Deserialize a tree from a file written with [`KdTree3::save_path`].
    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(&mut BufReader::new(File::open(path)?))
    }
}

impl KdTree2 {
    /// Serialize the tree to a binary stream.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_header(writer, 2, self.item_count, max_item_id(&self.root))?;
        for v in [
            self.bounds.min.x,
            self.bounds.min.y,
            self.bounds.max.x,
            self.bounds.max.y,
        ] {
            write_f64(writer, v)?;
        }
        write_node(writer, &self.root)
    }

    /// Deserialize a tree previously written with [`KdTree2::save`].
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let (item_count, max_id) = read_header(reader, 2)?;
        let min = Point2::new(read_f64(reader)?, read_f64(reader)?);
        let max = Point2::new(read_f64(reader)?, read_f64(reader)?);
        let root = read_node(reader, 2, item_count, max_id, 0)?;
        Ok(Self {
            root,
            bounds: Aabb2::new(min, max),
            item_count,
        })
    }

    /// Serialize the tree to a file, created or truncated.
    pub fn save_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Deserialize a tree from a file written with [`KdTree2::save_path`].
    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(&mut BufReader::new(File::open(path)?))
    }
}

/// Largest item id stored anywhere in the tree, 0 for an empty tree.
///
/// Ids are caller-assigned and need not be dense, so the item count says
/// nothing about their range. Recording the maximum in the header lets
/// loading reject ids the stream never legitimately held.
fn max_item_id(node: &KdNode) -> u32 {
    match node {
        KdNode::Leaf { items } => items.iter().copied().max().unwrap_or(0),
        KdNode::Interior { lower, upper, .. } => {
            let low = lower.as_deref().map_or(0, max_item_id);
            let high = upper.as_deref().map_or(0, max_item_id);
            low.max(high)
        }
    }
}

fn write_header<W: Write>(writer: &mut W, dimension: u8, item_count: u32, max_id: u32) -> Result<()> {
    writer.write_all(&MAGIC)?;
    write_u8(writer, VERSION)?;
    write_u8(writer, dimension)?;
    write_u32(writer, item_count)?;
    write_u32(writer, max_id)?;
    Ok(())
}

fn read_header<R: Read>(reader: &mut R, dimension: u8) -> Result<(u32, u32)> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(SpatialError::Corrupt(format!(
            "bad magic {magic:02x?}, expected {MAGIC:02x?}"
        )));
    }
    let version = read_u8(reader)?;
    if version != VERSION {
        return Err(SpatialError::Corrupt(format!(
            "unsupported stream version {version}"
        )));
    }
    let dim = read_u8(reader)?;
    if dim != dimension {
        return Err(SpatialError::Corrupt(format!(
            "stream holds a {dim}D tree, expected {dimension}D"
        )));
    }
    let item_count = read_u32(reader)?;
    let max_id = read_u32(reader)?;
    Ok((item_count, max_id))
}

fn write_node<W: Write>(writer: &mut W, node: &KdNode) -> Result<()> {
    match node {
        KdNode::Leaf { items } => {
            write_u8(writer, TAG_LEAF)?;
            write_u32(writer, items.len() as u32)?;
            for &id in items {
                write_u32(writer, id)?;
            }
            Ok(())
        }
        KdNode::Interior {
            axis,
            split,
            lower,
            upper,
        } => {
            write_u8(writer, TAG_INTERIOR)?;
            write_u8(writer, axis.index() as u8)?;
            write_f64(writer, *split)?;
            let mut presence = 0u8;
            if lower.is_some() {
                presence |= PRESENT_LOWER;
            }
            if upper.is_some() {
                presence |= PRESENT_UPPER;
            }
            write_u8(writer, presence)?;
            if let Some(child) = lower {
                write_node(writer, child)?;
            }
            if let Some(child) = upper {
                write_node(writer, child)?;
            }
            Ok(())
        }
    }
}

fn read_node<R: Read>(
    reader: &mut R,
    dimension: u8,
    item_count: u32,
    max_id: u32,
    depth: usize,
) -> Result<KdNode> {
    if depth > MAX_STREAM_DEPTH {
        return Err(SpatialError::Corrupt(format!(
            "node nesting exceeds {MAX_STREAM_DEPTH} levels"
        )));
    }
    match read_u8(reader)? {
        TAG_LEAF => {
            let count = read_u32(reader)?;
            if count > item_count {
                return Err(SpatialError::Corrupt(format!(
                    "leaf holds {count} ids but the tree was built from {item_count} items"
                )));
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let id = read_u32(reader)?;
                if id > max_id {
                    return Err(SpatialError::Corrupt(format!(
                        "leaf item id {id} exceeds the stream's declared maximum {max_id}"
                    )));
                }
                items.push(id);
            }
            Ok(KdNode::Leaf { items })
        }
        TAG_INTERIOR => {
            let axis = read_u8(reader)?;
            if axis >= dimension {
                return Err(SpatialError::Corrupt(format!(
                    "split axis {axis} out of range for a {dimension}D tree"
                )));
            }
            let split = read_f64(reader)?;
            if !split.is_finite() {
                return Err(SpatialError::Corrupt(format!(
                    "non-finite split position {split}"
                )));
            }
            let presence = read_u8(reader)?;
            if presence == 0 || presence > (PRESENT_LOWER | PRESENT_UPPER) {
                return Err(SpatialError::Corrupt(format!(
                    "invalid child presence byte {presence:#04b}"
                )));
            }
            let lower = if presence & PRESENT_LOWER != 0 {
                Some(Box::new(read_node(
                    reader,
                    dimension,
                    item_count,
                    max_id,
                    depth + 1,
                )?))
            } else {
                None
            };
            let upper = if presence & PRESENT_UPPER != 0 {
                Some(Box::new(read_node(
                    reader,
                    dimension,
                    item_count,
                    max_id,
                    depth + 1,
                )?))
            } else {
                None
            };
            Ok(KdNode::Interior {
                axis: Axis::from_index(axis as usize),
                split,
                lower,
                upper,
            })
        }
        tag => Err(SpatialError::Corrupt(format!("unknown node tag {tag}"))),
    }
}

fn write_u8<W: Write>(writer: &mut W, v: u8) -> Result<()> {
    writer.write_all(&[v])?;
    Ok(())
}

fn write_u32<W: Write>(writer: &mut W, v: u32) -> Result<()> {
    writer.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64<W: Write>(writer: &mut W, v: f64) -> Result<()> {
    writer.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64<R: Read>(reader: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::{BoundingVolume, Item, Item2};
    use crate::kd2::BoundsLeafTest2;
    use crate::kd3::BoundsLeafTest;
    use crate::ray::Ray;
    use crate::tree::KdTreeConfig;
    use raycore_math::Vec3;

    fn sample_items() -> Vec<Item> {
        (0..24)
            .map(|i| {
                let x = (i % 6) as f64 * 2.0;
                let y = (i / 6) as f64 * 2.0;
                Item::new(
                    i,
                    BoundingVolume::Box(Aabb3::new(
                        Point3::new(x, y, 0.0),
                        Point3::new(x + 1.0, y + 1.0, 1.0),
                    )),
                )
            })
            .collect()
    }

    #[test]
    fn round_trip_preserves_query_results() {
        let items = sample_items();
        let tree = KdTree3::build(&items, &KdTreeConfig::default()).unwrap();

        let mut buf = Vec::new();
        tree.save(&mut buf).unwrap();
        let restored = KdTree3::load(&mut buf.as_slice()).unwrap();
        assert_eq!(tree, restored);

        let tester = BoundsLeafTest::new(&items);
        let rays = [
            Ray::new(Point3::new(-3.0, 0.5, 0.5), Vec3::x()).unwrap(),
            Ray::new(Point3::new(4.5, 2.5, 5.0), -Vec3::z()).unwrap(),
            Ray::new(Point3::new(-3.0, 9.0, 0.5), Vec3::x()).unwrap(),
        ];
        for ray in &rays {
            assert_eq!(
                tree.trace(ray, f64::INFINITY, &tester),
                restored.trace(ray, f64::INFINITY, &tester)
            );
        }
        for item in &items {
            let p = Point3::new(
                item.bounds.aabb().min.x + 0.5,
                item.bounds.aabb().min.y + 0.5,
                0.5,
            );
            assert_eq!(
                tree.items_containing(&p, &tester),
                restored.items_containing(&p, &tester)
            );
        }
    }

    #[test]
    fn round_trip_2d() {
        let items: Vec<Item2> = (0..12)
            .map(|i| {
                let x = i as f64 * 2.0;
                Item2::new(
                    i,
                    Aabb2::new(Point2::new(x, 0.0), Point2::new(x + 1.0, 1.0)),
                )
            })
            .collect();
        let tree = KdTree2::build(&items, &KdTreeConfig::default()).unwrap();

        let mut buf = Vec::new();
        tree.save(&mut buf).unwrap();
        let restored = KdTree2::load(&mut buf.as_slice()).unwrap();
        assert_eq!(tree, restored);

        let tester = BoundsLeafTest2::new(&items);
        assert_eq!(
            tree.items_containing(&Point2::new(4.5, 0.5), &tester),
            restored.items_containing(&Point2::new(4.5, 0.5), &tester)
        );
    }

    #[test]
    fn bad_magic_is_fatal() {
        let items = sample_items();
        let tree = KdTree3::build(&items, &KdTreeConfig::default()).unwrap();
        let mut buf = Vec::new();
        tree.save(&mut buf).unwrap();
        buf[0] = b'X';
        assert!(matches!(
            KdTree3::load(&mut buf.as_slice()),
            Err(SpatialError::Corrupt(_))
        ));
    }

    #[test]
    fn wrong_dimension_is_fatal() {
        let tree = KdTree2::build(&[], &KdTreeConfig::default()).unwrap();
        let mut buf = Vec::new();
        tree.save(&mut buf).unwrap();
        assert!(matches!(
            KdTree3::load(&mut buf.as_slice()),
            Err(SpatialError::Corrupt(_))
        ));
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let items = sample_items();
        let tree = KdTree3::build(&items, &KdTreeConfig::default()).unwrap();
        let mut buf = Vec::new();
        tree.save(&mut buf).unwrap();
        buf.truncate(buf.len() / 2);
        assert!(KdTree3::load(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn oversized_leaf_is_fatal() {
        // A leaf claiming more ids than the build had items is structurally
        // inconsistent.
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(VERSION);
        buf.push(3);
        buf.extend_from_slice(&2u32.to_le_bytes()); // item count
        buf.extend_from_slice(&1u32.to_le_bytes()); // max item id
        for _ in 0..6 {
            buf.extend_from_slice(&0f64.to_le_bytes());
        }
        buf.push(TAG_LEAF);
        buf.extend_from_slice(&100u32.to_le_bytes());
        assert!(matches!(
            KdTree3::load(&mut buf.as_slice()),
            Err(SpatialError::Corrupt(_))
        ));
    }

    #[test]
    fn out_of_range_id_is_fatal() {
        // A flipped id bit would otherwise load fine and index out of
        // bounds on the first query.
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(VERSION);
        buf.push(3);
        buf.extend_from_slice(&6u32.to_le_bytes()); // item count
        buf.extend_from_slice(&5u32.to_le_bytes()); // max item id
        for _ in 0..6 {
            buf.extend_from_slice(&0f64.to_le_bytes());
        }
        buf.push(TAG_LEAF);
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        assert!(matches!(
            KdTree3::load(&mut buf.as_slice()),
            Err(SpatialError::Corrupt(_))
        ));
    }

    #[test]
    fn interior_without_children_is_fatal() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(VERSION);
        buf.push(3);
        buf.extend_from_slice(&0u32.to_le_bytes()); // item count
        buf.extend_from_slice(&0u32.to_le_bytes()); // max item id
        for _ in 0..6 {
            buf.extend_from_slice(&0f64.to_le_bytes());
        }
        buf.push(TAG_INTERIOR);
        buf.push(0); // axis
        buf.extend_from_slice(&0.5f64.to_le_bytes());
        buf.push(0); // no children
        assert!(matches!(
            KdTree3::load(&mut buf.as_slice()),
            Err(SpatialError::Corrupt(_))
        ));
    }
}
