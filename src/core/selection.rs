use crate::types::{SceneRecord, ShoalError, ShoalResult};

/// Ranking key for scene selection; lower is better
pub type RankingKey = fn(&SceneRecord) -> f64;

pub fn cloud_cover_key(scene: &SceneRecord) -> f64 {
    scene.cloud_cover
}

/// Picks the best scene of a collection by minimum ranking key
#[derive(Debug, Clone, Copy)]
pub struct SceneSelector {
    key: RankingKey,
}

impl Default for SceneSelector {
    fn default() -> Self {
        Self::by_cloud_cover()
    }
}

impl SceneSelector {
    pub fn new(key: RankingKey) -> Self {
        Self { key }
    }

    pub fn by_cloud_cover() -> Self {
        Self::new(cloud_cover_key)
    }

    /// Scene with the minimum key; ties go to the earliest scene in input order.
    /// NaN keys rank after every number.
    pub fn select_best<'a>(&self, scenes: &'a [SceneRecord]) -> ShoalResult<&'a SceneRecord> {
        let mut best: Option<(&SceneRecord, f64)> = None;

        for scene in scenes {
            let key = (self.key)(scene);
            let better = match best {
                None => true,
                Some((_, current)) => (current.is_nan() && !key.is_nan()) || key < current,
            };
            if better {
                best = Some((scene, key));
            }
        }

        best.map(|(scene, _)| scene).ok_or(ShoalError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(name: &str, cloud_cover: f64) -> SceneRecord {
        SceneRecord {
            id: name.to_lowercase(),
            name: name.to_string(),
            cloud_cover,
            download_link: None,
            acquired: None,
        }
    }

    #[test]
    fn test_selects_minimum_cloud_cover() {
        let scenes = vec![scene("A", 45.2), scene("B", 12.0), scene("C", 99.9)];
        let best = SceneSelector::default().select_best(&scenes).unwrap();
        assert_eq!(best.name, "B");
    }

    #[test]
    fn test_ties_keep_first_occurrence() {
        let scenes = vec![scene("A", 30.0), scene("B", 5.0), scene("C", 5.0), scene("D", 5.0)];
        let best = SceneSelector::default().select_best(&scenes).unwrap();
        assert_eq!(best.name, "B");
    }

    #[test]
    fn test_empty_collection_is_not_found() {
        let result = SceneSelector::default().select_best(&[]);
        assert!(matches!(result, Err(ShoalError::NotFound)));
    }

    #[test]
    fn test_nan_keys_rank_last() {
        let scenes = vec![scene("A", f64::NAN), scene("B", 80.0), scene("C", f64::NAN)];
        let best = SceneSelector::default().select_best(&scenes).unwrap();
        assert_eq!(best.name, "B");
    }

    #[test]
    fn test_custom_ranking_key() {
        // Longest name wins, clouds ignored
        let selector = SceneSelector::new(|s| -(s.name.len() as f64));
        let scenes = vec![scene("short", 1.0), scene("much-longer", 90.0)];
        assert_eq!(selector.select_best(&scenes).unwrap().name, "much-longer");
    }
}
