//! Common test fixtures for nightlights tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in catalog search and compositing.

use std::path::{Path, PathBuf};

/// Common bounding box definitions for testing, as `(minx, miny, maxx, maxy)`.
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Greater Lagos
    pub const LAGOS: (f64, f64, f64, f64) = (3.0, 6.3, 3.7, 6.8);

    /// Nigeria
    pub const NIGERIA: (f64, f64, f64, f64) = (2.7, 4.2, 14.7, 13.9);

    /// Invalid bbox (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Flag codes treated as good in the fixtures.
pub const GOOD_FLAGS: [u32; 3] = [0, 2, 4];

/// Flag code never present in [`GOOD_FLAGS`].
pub const BAD_FLAG: u32 = 8;

/// Quality flag table text, with the comment and blank lines the parser
/// must skip.
pub fn quality_flags_text() -> String {
    let mut text = String::from("# good VIIRS vflag codes\n\n");
    for code in GOOD_FLAGS {
        text.push_str(&format!("{}\n", code));
    }
    text
}

/// Radiance file name for an acquisition on `yyyymmdd`, following the
/// NOAA granule naming scheme.
pub fn radiance_name(yyyymmdd: &str, granule: u32) -> String {
    format!(
        "SVDNB_npp_d{}_t{:07}_e{:07}_b{:05}_c{}000000000000_noaa_ops.rade9.co.tif",
        yyyymmdd,
        granule,
        granule + 1,
        granule,
        yyyymmdd
    )
}

/// Flag file name paired with [`radiance_name`].
pub fn flag_name(yyyymmdd: &str, granule: u32) -> String {
    format!(
        "npp_d{}_t{:07}_e{:07}_b{:05}.vflag.co.tif",
        yyyymmdd,
        granule,
        granule + 1,
        granule
    )
}

/// A four-scene catalog CSV.
///
/// | id         | date       | bbox               |
/// |------------|------------|--------------------|
/// | scene_a    | 2014/01/01 | [0, 0, 10, 10]     |
/// | scene_b    | 2014/01/15 | [5, 5, 15, 15]     |
/// | scene_c    | 2014/02/01 | [20, 20, 30, 30]   |
/// | scene_d    | 2014/03/10 | [-10, -10, 0, 0]   |
///
/// The leading unnamed index column mirrors catalogs exported from data
/// frames and must be ignored by the loader.
pub const CATALOG_CSV: &str = r#",id,collection,json_href,href,bbox,geometry,date,datetime
0,scene_a,VIIRS_DNB_rade9_npp_201401,,data/scene_a.rade9.co.tif,"[0.0, 0.0, 10.0, 10.0]","{'type': 'Polygon', 'coordinates': [[[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]]]}",2014/01/01,2014-01-01 01:10:00
1,scene_b,VIIRS_DNB_rade9_npp_201401,,data/scene_b.rade9.co.tif,"[5.0, 5.0, 15.0, 15.0]","{'type': 'Polygon', 'coordinates': [[[5.0, 5.0], [5.0, 15.0], [15.0, 15.0], [15.0, 5.0], [5.0, 5.0]]]}",2014/01/15,2014-01-15 02:20:00
2,scene_c,VIIRS_DNB_rade9_npp_201402,,data/scene_c.rade9.co.tif,"[20.0, 20.0, 30.0, 30.0]","{'type': 'Polygon', 'coordinates': [[[20.0, 20.0], [20.0, 30.0], [30.0, 30.0], [30.0, 20.0], [20.0, 20.0]]]}",2014/02/01,2014-02-01 03:30:00
3,scene_d,VIIRS_DNB_rade9_npp_201403,,data/scene_d.rade9.co.tif,"[-10.0, -10.0, 0.0, 0.0]","{'type': 'Polygon', 'coordinates': [[[-10.0, -10.0], [-10.0, 0.0], [0.0, 0.0], [0.0, -10.0], [-10.0, -10.0]]]}",2014/03/10,2014-03-10 04:40:00
"#;

/// Write `contents` to `name` inside `dir`, returning the full path.
pub fn write_fixture(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture dir");
    }
    std::fs::write(&path, contents).expect("write fixture");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_flags_text_lists_good_codes() {
        let text = quality_flags_text();
        let codes: Vec<u32> = text
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
            .map(|l| l.parse().unwrap())
            .collect();
        assert_eq!(codes, GOOD_FLAGS.to_vec());
    }

    #[test]
    fn test_file_names_share_granule_stem() {
        let rad = radiance_name("20140101", 1234);
        let flag = flag_name("20140101", 1234);
        assert!(rad.starts_with("SVDNB_npp_d20140101_t0001234_e0001235_b01234_"));
        assert!(flag.starts_with("npp_d20140101_t0001234_e0001235_b01234"));
    }

    #[test]
    fn test_write_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "nested/a.txt", "hello");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
