//! Checks on how the decode library was built.
//!
//! OpenCV's `getBuildInformation()` prints an indented `Key: value` tree. It is
//! flattened here into `Parent_Child` keys so a run can insist on build
//! features (e.g. `Video I/O_FFMPEG`) before trusting any seek results.

use std::collections::BTreeMap;

/// Flatten an indented `Key: value` dump into `Parent_Child -> value`.
pub fn parse_build_information(text: &str) -> BTreeMap<String, String> {
    let mut infos = BTreeMap::new();
    let mut context: Vec<(usize, String)> = Vec::new();

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let level = line.len() - line.trim_start().len();
        while context.last().is_some_and(|(top, _)| level <= *top) {
            context.pop();
        }
        context.push((level, key.trim().to_string()));

        let joined = context
            .iter()
            .map(|(_, k)| k.as_str())
            .collect::<Vec<_>>()
            .join("_");
        infos.insert(joined, value.trim().to_string());
    }

    infos
}

/// A `KEY=SUBSTRING` requirement on the flattened build information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequirement {
    pub key: String,
    pub contains: String,
}

impl std::str::FromStr for BuildRequirement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, contains) = s
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=SUBSTRING, got {:?}", s))?;
        Ok(Self {
            key: key.trim().to_string(),
            contains: contains.trim().to_string(),
        })
    }
}

/// Requirements not satisfied by `infos`, with the value that was found.
pub fn unmet_requirements<'a>(
    infos: &BTreeMap<String, String>,
    requirements: &'a [BuildRequirement],
) -> Vec<(&'a BuildRequirement, Option<String>)> {
    requirements
        .iter()
        .filter_map(|req| match infos.get(&req.key) {
            Some(value) if value.contains(&req.contains) => None,
            found => Some((req, found.cloned())),
        })
        .collect()
}

#[cfg(feature = "opencv")]
pub fn opencv_build_information() -> crate::error::VideoResult<String> {
    opencv::core::get_build_information()
        .map_err(|e| crate::error::VideoError::Backend(format!("opencv: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
General configuration for OpenCV 4.9.0 =====================================
  Version control:               unknown

  Video I/O:
    DC1394:                      NO
    FFMPEG:                      YES
      avcodec:                   YES (60.31.102)
      avformat:                  YES (60.16.100)
    GStreamer:                   NO

  Parallel framework:            TBB (ver 2021.11 interface 12110)
";

    #[test]
    fn test_parse_nested_keys() {
        let infos = parse_build_information(SAMPLE);
        assert_eq!(infos["Version control"], "unknown");
        assert_eq!(infos["Video I/O_FFMPEG"], "YES");
        assert_eq!(infos["Video I/O_FFMPEG_avcodec"], "YES (60.31.102)");
        assert_eq!(infos["Video I/O_GStreamer"], "NO");
        assert_eq!(
            infos["Parallel framework"],
            "TBB (ver 2021.11 interface 12110)"
        );
        assert!(!infos.contains_key("Video I/O_FFMPEG_GStreamer"));
    }

    #[test]
    fn test_requirements() {
        let infos = parse_build_information(SAMPLE);
        let reqs: Vec<BuildRequirement> = ["Parallel framework=TBB", "Video I/O_GStreamer=YES"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let unmet = unmet_requirements(&infos, &reqs);
        assert_eq!(unmet.len(), 1);
        assert_eq!(unmet[0].0.key, "Video I/O_GStreamer");
        assert_eq!(unmet[0].1.as_deref(), Some("NO"));

        assert!("no-equals-sign".parse::<BuildRequirement>().is_err());
    }
}
