//! Binary grid snapshots.
//!
//! Layout: one tag byte ([`GridKind::tag`]), one format version byte, then the
//! bincode encoding of the variant's parameters. Decoding dispatches on the
//! tag explicitly; tags outside the closed set fail with
//! `Error::UnknownGridTag`.

use serde::{de::DeserializeOwned, Serialize};

use sdp_core::{
    errors::{Error, Result},
    fail,
};

use crate::grid::{Grid, GridKind, SpaceGrid};
use crate::{GeneralSpaceGrid, RegularLegendreGrid, RegularSpaceGrid, SparseSpaceGrid};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

fn encode_body<T: Serialize>(out: &mut Vec<u8>, value: &T) -> Result<()> {
    bincode::serialize_into(out, value).map_err(|e| Error::Codec(e.to_string()))
}

fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Codec(e.to_string()))
}

/// Encode a grid.
pub fn encode(grid: &SpaceGrid) -> Result<Vec<u8>> {
    let mut out = vec![grid.kind().tag(), SNAPSHOT_VERSION];
    match grid {
        SpaceGrid::Regular(g) => encode_body(&mut out, g)?,
        SpaceGrid::General(g) => encode_body(&mut out, g)?,
        SpaceGrid::RegularLegendre(g) => encode_body(&mut out, g)?,
        SpaceGrid::Sparse(g) => encode_body(&mut out, g)?,
    }
    Ok(out)
}

/// Decode a grid written by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<SpaceGrid> {
    let (tag, version, body) = match bytes {
        [tag, version, body @ ..] => (*tag, *version, body),
        _ => fail!("grid snapshot of {} bytes is truncated", bytes.len()),
    };
    let kind = GridKind::from_tag(tag)?;
    if version != SNAPSHOT_VERSION {
        return Err(Error::Codec(format!(
            "grid snapshot version {version}, expected {SNAPSHOT_VERSION}"
        )));
    }
    let grid = match kind {
        GridKind::Regular => SpaceGrid::Regular(decode_body::<RegularSpaceGrid>(body)?),
        GridKind::General => SpaceGrid::General(decode_body::<GeneralSpaceGrid>(body)?),
        GridKind::RegularLegendre => {
            SpaceGrid::RegularLegendre(decode_body::<RegularLegendreGrid>(body)?)
        }
        GridKind::SparseBound | GridKind::SparseNoBound => {
            SpaceGrid::Sparse(decode_body::<SparseSpaceGrid>(body)?)
        }
    };
    if grid.kind() != kind {
        return Err(Error::Codec(format!(
            "grid snapshot tagged {kind:?} decodes to {:?}",
            grid.kind()
        )));
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_survives() {
        let grids: Vec<SpaceGrid> = vec![
            RegularSpaceGrid::new(vec![0.0, 1.0], vec![0.5, 0.25], vec![4, 8])
                .unwrap()
                .into(),
            GeneralSpaceGrid::new(vec![vec![0.0, 1.0, 3.0]]).unwrap().into(),
            RegularLegendreGrid::new(vec![0.0], vec![1.0], vec![2], vec![3])
                .unwrap()
                .into(),
            SparseSpaceGrid::new(vec![0.0; 2], vec![1.0; 2], 3, vec![1.0, 1.5], false)
                .unwrap()
                .into(),
        ];
        for g in grids {
            let bytes = encode(&g).unwrap();
            assert_eq!(bytes[0], g.kind().tag());
            assert_eq!(decode(&bytes).unwrap(), g);
        }
    }

    #[test]
    fn unknown_tag() {
        assert_eq!(decode(&[42, 1, 0]), Err(Error::UnknownGridTag(42)));
    }

    #[test]
    fn truncated() {
        assert!(decode(&[1]).is_err());
    }
}
