use crate::common::{Value, TAG_GEO};
use crate::errors::{CloverError, CloverResult, ErrorKind};
use crate::index::key_codec::{doc_id_of, entry_key, index_prefix, unsupported_value};
use crate::index::range_index::{delete_prefix, ttl_to_duration, walk};
use crate::index::{GeoSpatialIndexInfo, IndexInfo, IndexProvider, OnValue};
use crate::store::{prefix_successor, KeyRange, KvTransaction};
use chrono::TimeDelta;

/// A 2D bounding box represented by its minimum and maximum corners.
///
/// # Examples
///
/// ```rust,ignore
/// use clover::index::BoundingBox;
///
/// let region = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
/// assert!(region.contains_point(50.0, 50.0));
/// ```
#[derive(Clone, Copy, PartialEq, Default, Debug)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Returns `true` if the point lies inside the box, borders included.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Spreads the 32 bits of `v` over the even bits of a `u64`.
fn spread(v: u32) -> u64 {
    let mut v = v as u64;
    v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF;
    v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    v = (v | (v << 1)) & 0x5555_5555_5555_5555;
    v
}

/// Inverse of [spread].
fn compact(z: u64) -> u32 {
    let mut v = z & 0x5555_5555_5555_5555;
    v = (v | (v >> 1)) & 0x3333_3333_3333_3333;
    v = (v | (v >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v >> 4)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v >> 8)) & 0x0000_FFFF_0000_FFFF;
    v = (v | (v >> 16)) & 0x0000_0000_FFFF_FFFF;
    v as u32
}

/// Interleaves two quantized coordinates into a Z-order key; `x` takes the
/// even bits and `y` the odd ones.
pub(crate) fn morton_key(x: u32, y: u32) -> u64 {
    spread(x) | (spread(y) << 1)
}

pub(crate) fn split_morton_key(z: u64) -> (u32, u32) {
    (compact(z), compact(z >> 1))
}

/// Geospatial index over a field holding a point `[x, y]`.
///
/// Both coordinates are quantized to 32 bits over the index domain and
/// interleaved into a 64-bit Z-order key, so nearby points tend to have
/// nearby keys and a rectangular region maps to one key range.
pub struct GeoIndex {
    info: IndexInfo,
    domain: GeoSpatialIndexInfo,
    prefix: Vec<u8>,
}

impl GeoIndex {
    pub fn new(info: IndexInfo, domain: GeoSpatialIndexInfo) -> Self {
        let prefix = index_prefix(&info);
        GeoIndex { info, domain, prefix }
    }

    fn quantize(&self, coordinate: f64) -> CloverResult<u32> {
        let (min, max) = (self.domain.min_range(), self.domain.max_range());
        if !(coordinate >= min && coordinate <= max) {
            log::error!("Coordinate {} is outside [{}, {}] of {}", coordinate, min, max, self.info);
            return Err(CloverError::new(
                &format!(
                    "coordinate {} of field {} is outside the domain [{}, {}]",
                    coordinate,
                    self.info.field(),
                    min,
                    max
                ),
                ErrorKind::EncodingFailure,
            ));
        }
        let ratio = (coordinate - min) / (max - min);
        Ok((ratio * u32::MAX as f64).round() as u32)
    }

    fn point_of(&self, value: &Value) -> CloverResult<(f64, f64)> {
        let coordinates = match value.as_array() {
            Some(items) if items.len() == 2 => items,
            _ => return Err(unsupported_value(&self.info, value)),
        };
        match (coordinates[0].as_f64(), coordinates[1].as_f64()) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(unsupported_value(&self.info, value)),
        }
    }

    fn encode_point(&self, value: &Value) -> CloverResult<Vec<u8>> {
        let (x, y) = self.point_of(value)?;
        let z = morton_key(self.quantize(x)?, self.quantize(y)?);
        let mut encoded = Vec::with_capacity(9);
        encoded.push(TAG_GEO);
        encoded.extend_from_slice(&z.to_be_bytes());
        Ok(encoded)
    }

    fn key_of(&self, doc_id: &str, value: &Value) -> CloverResult<Vec<u8>> {
        let encoded = self.encode_point(value)?;
        entry_key(&self.prefix, &encoded, doc_id)
    }

    fn z_of(&self, key: &[u8]) -> Option<u64> {
        let start = self.prefix.len() + 1;
        let bytes = key.get(start..start + 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Some(u64::from_be_bytes(buf))
    }

    /// Clamps `region` to the domain; `None` when they do not overlap.
    fn clamp(&self, region: &BoundingBox) -> Option<BoundingBox> {
        let (min, max) = (self.domain.min_range(), self.domain.max_range());
        let clamped = BoundingBox::new(
            region.min_x.max(min),
            region.min_y.max(min),
            region.max_x.min(max),
            region.max_y.min(max),
        );
        if clamped.min_x > clamped.max_x || clamped.min_y > clamped.max_y {
            None
        } else {
            Some(clamped)
        }
    }
}

impl IndexProvider for GeoIndex {
    fn info(&self) -> &IndexInfo {
        &self.info
    }

    fn add(
        &self,
        txn: &mut dyn KvTransaction,
        doc_id: &str,
        value: &Value,
        ttl: TimeDelta,
    ) -> CloverResult<()> {
        let key = self.key_of(doc_id, value)?;
        log::trace!("Indexing point {} of {} for document {}", value, self.info.field(), doc_id);
        txn.set(&key, &[], ttl_to_duration(ttl)?)
    }

    fn remove(&self, txn: &mut dyn KvTransaction, doc_id: &str, value: &Value) -> CloverResult<()> {
        let key = self.key_of(doc_id, value)?;
        txn.delete(&key)
    }

    fn iterate(&self, txn: &dyn KvTransaction, reverse: bool, on_value: &mut OnValue) -> CloverResult<()> {
        walk(txn, KeyRange::prefix(self.prefix.clone()), reverse, on_value)
    }

    fn drop_index(&self, txn: &mut dyn KvTransaction) -> CloverResult<()> {
        let removed = delete_prefix(txn, &self.prefix)?;
        log::debug!("Dropped {} with {} entries", self.info, removed);
        Ok(())
    }

    fn iterate_region(
        &self,
        txn: &dyn KvTransaction,
        region: &BoundingBox,
        on_value: &mut OnValue,
    ) -> CloverResult<()> {
        if [region.min_x, region.min_y, region.max_x, region.max_y]
            .iter()
            .any(|c| c.is_nan())
        {
            log::error!("Region {:?} has NaN coordinates", region);
            return Err(CloverError::new(
                &format!("region {:?} has NaN coordinates", region),
                ErrorKind::EncodingFailure,
            ));
        }
        let region = match self.clamp(region) {
            Some(region) => region,
            None => return Ok(()),
        };

        let (min_qx, min_qy) = (self.quantize(region.min_x)?, self.quantize(region.min_y)?);
        let (max_qx, max_qy) = (self.quantize(region.max_x)?, self.quantize(region.max_y)?);

        let mut start = self.prefix.clone();
        start.push(TAG_GEO);
        let mut end = start.clone();
        start.extend_from_slice(&morton_key(min_qx, min_qy).to_be_bytes());
        end.extend_from_slice(&morton_key(max_qx, max_qy).to_be_bytes());
        let end = prefix_successor(&end).ok_or_else(|| {
            CloverError::new("index prefix has no upper bound", ErrorKind::InternalError)
        })?;

        for entry in txn.scan(KeyRange::range(start, end), false)? {
            let (key, _) = entry?;
            let inside = self.z_of(&key).map(split_morton_key).is_some_and(|(qx, qy)| {
                qx >= min_qx && qx <= max_qx && qy >= min_qy && qy <= max_qy
            });
            if inside {
                on_value(doc_id_of(&key)?)?;
            }
        }
        Ok(())
    }
}
