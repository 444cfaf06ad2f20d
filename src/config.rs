//! Remote configuration: the settings document served by `/api/config/`
//! and the client-side cache of the matrix geometry.
//!
//! Only `matrix.{width,height}` feeds the rasterizer. The WLED and
//! animation sections are carried so `config show` / `config set` can
//! round-trip them.

use crate::MatrixGeometry;
use crate::client::DeviceApi;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

// ── Remote document ──────────────────────────────────────────────────

/// The `data` object of a configuration response. Any section may be
/// missing; a missing section never overwrites cached values.
///
/// Sections are parsed independently: one that doesn't fit its type is
/// logged and treated as missing, so a bad WLED entry can't hide a good
/// matrix geometry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default, deserialize_with = "lenient_section")]
    pub matrix: Option<MatrixGeometry>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub wled: Option<WledSettings>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub animation: Option<AnimationSettings>,
}

fn lenient_section<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(value) = Option::<serde_json::Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(section) => Ok(Some(section)),
        Err(e) => {
            tracing::warn!("Ignoring malformed config section: {}", e);
            Ok(None)
        }
    }
}

/// Where the WLED controller lives and how frames are oriented on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WledSettings {
    pub ip: String,
    pub port: u16,
    pub protocol: String,
    /// Degrees: 0, 90, 180 or 270
    pub rotation: u16,
    pub mirror_v: bool,
    pub mirror_h: bool,
}

impl Default for WledSettings {
    fn default() -> Self {
        Self {
            ip: "192.168.1.100".to_string(),
            port: 80,
            protocol: "http".to_string(),
            rotation: 0,
            mirror_v: false,
            mirror_h: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    /// Milliseconds between frames
    pub frame_delay: u32,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            loop_playback: false,
            frame_delay: 100,
        }
    }
}

/// Partial update body for `POST /api/config/`. Unset fields are left
/// unchanged by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wled_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wled_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wled_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wled_rotation: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wled_mirror_v: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wled_mirror_h: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation_loop: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation_frame_delay: Option<u32>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ── Geometry cache ───────────────────────────────────────────────────

/// Last known matrix geometry.
///
/// Starts at the 20×20 default. Updates replace both dimensions together
/// or not at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeometryCache {
    current: MatrixGeometry,
}

impl GeometryCache {
    pub fn new(initial: MatrixGeometry) -> Self {
        Self { current: initial }
    }

    pub fn get(&self) -> MatrixGeometry {
        self.current
    }

    /// Take the matrix section of `config` if it is present and usable.
    /// Returns whether the cache changed.
    pub fn apply(&mut self, config: &RemoteConfig) -> bool {
        match config.matrix {
            Some(geometry) if geometry.is_valid() => {
                let changed = geometry != self.current;
                self.current = geometry;
                changed
            }
            Some(geometry) => {
                tracing::warn!("Ignoring invalid matrix geometry {} from config", geometry);
                false
            }
            None => false,
        }
    }

    /// Fetch the configuration and update the cache.
    ///
    /// Never fails: on any error the previous geometry is kept and the
    /// problem is only logged.
    pub async fn refresh<A: DeviceApi>(&mut self, api: &A) -> MatrixGeometry {
        match api.fetch_config().await {
            Ok(config) => {
                if self.apply(&config) {
                    tracing::info!("Matrix geometry updated to {}", self.current);
                }
            }
            Err(e) => {
                tracing::warn!("Error loading config, keeping {}: {}", self.current, e);
            }
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn full_document_deserializes() {
        let json = r#"{
            "matrix": {"width": 32, "height": 16},
            "wled": {"ip": "10.0.0.5", "port": 8080, "protocol": "https",
                     "rotation": 90, "mirror_v": true, "mirror_h": false},
            "animation": {"loop": true, "frame_delay": 250}
        }"#;
        let config: RemoteConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.matrix, Some(MatrixGeometry::new(32, 16)));
        let wled = config.wled.unwrap();
        assert_eq!(wled.ip, "10.0.0.5");
        assert_eq!(wled.rotation, 90);
        assert!(wled.mirror_v);
        let animation = config.animation.unwrap();
        assert!(animation.loop_playback);
        assert_eq!(animation.frame_delay, 250);
    }

    #[test]
    fn missing_sections_are_none() {
        let config: RemoteConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RemoteConfig::default());
    }

    #[test]
    fn partial_wled_section_uses_defaults() {
        let config: RemoteConfig = serde_json::from_str(r#"{"wled": {"ip": "1.2.3.4"}}"#).unwrap();
        let wled = config.wled.unwrap();
        assert_eq!(wled.ip, "1.2.3.4");
        assert_eq!(wled.port, 80);
        assert_eq!(wled.protocol, "http");
    }

    #[rstest]
    #[case(r#"{"ip": null}"#)]
    #[case(r#"{"port": 70000}"#)]
    #[case(r#"{"rotation": -90}"#)]
    #[case(r#""not an object""#)]
    fn malformed_wled_section_keeps_matrix(#[case] wled: &str) {
        let json = format!(r#"{{"matrix": {{"width": 32, "height": 16}}, "wled": {wled}}}"#);
        let config: RemoteConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.matrix, Some(MatrixGeometry::new(32, 16)));
        assert_eq!(config.wled, None);

        let mut cache = GeometryCache::default();
        assert!(cache.apply(&config));
        assert_eq!(cache.get(), MatrixGeometry::new(32, 16));
    }

    #[test]
    fn malformed_matrix_section_is_ignored() {
        let config: RemoteConfig = serde_json::from_str(
            r#"{"matrix": {"width": "wide"}, "animation": {"loop": true}}"#,
        )
        .unwrap();
        assert_eq!(config.matrix, None);
        assert!(config.animation.unwrap().loop_playback);
    }

    #[test]
    fn cache_applies_valid_geometry() {
        let mut cache = GeometryCache::default();
        let config = RemoteConfig {
            matrix: Some(MatrixGeometry::new(8, 32)),
            ..Default::default()
        };
        assert!(cache.apply(&config));
        assert_eq!(cache.get(), MatrixGeometry::new(8, 32));
    }

    #[test]
    fn cache_ignores_missing_and_invalid_geometry() {
        let mut cache = GeometryCache::new(MatrixGeometry::new(16, 16));

        assert!(!cache.apply(&RemoteConfig::default()));
        assert!(!cache.apply(&RemoteConfig {
            matrix: Some(MatrixGeometry::new(0, 16)),
            ..Default::default()
        }));
        assert_eq!(cache.get(), MatrixGeometry::new(16, 16));
    }

    #[test]
    fn config_update_skips_unset_fields() {
        let update = ConfigUpdate {
            matrix_width: Some(32),
            wled_mirror_h: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"matrix_width": 32, "wled_mirror_h": true})
        );
        assert!(!update.is_empty());
        assert!(ConfigUpdate::default().is_empty());
    }
}
