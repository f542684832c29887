use crate::config::{SceneryConfig, SectionConfig, SectionsFile};
use crate::gameplay::bounds::Footprint;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    #[default]
    Office,
    Residential,
    Shop,
    Park,
    Corporate,
    Tech,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityPolicy {
    #[default]
    FirstInCatalog,
    GloballyNearest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelContent {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointOfInterest {
    pub id: String,
    pub title: String,
    pub label: String,
    pub description: String,
    pub content: PanelContent,
    pub position: Vec2,
    pub footprint: Footprint,
    pub height: f32,
    pub activation_radius: f32,
    pub color: [f32; 3],
    pub kind: BuildingKind,
}

impl PointOfInterest {
    pub fn from_config(section: &SectionConfig) -> Self {
        let position = Vec2::from(section.position);
        Self {
            id: section.id.clone(),
            title: section.title.clone(),
            label: section.label.clone(),
            description: section.description.clone(),
            content: PanelContent {
                title: section.content.title.clone(),
                body: section.content.body.clone(),
            },
            position,
            footprint: Footprint::new(
                position,
                Vec2::new(section.size[0], section.size[2]) * 0.5,
            ),
            height: section.size[1],
            activation_radius: section.activation_radius,
            color: section.color,
            kind: section.kind,
        }
    }

    pub fn is_in_range(&self, position: Vec2) -> bool {
        position.distance(self.position) < self.activation_radius
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneryBuilding {
    pub kind: BuildingKind,
    pub footprint: Footprint,
    pub height: f32,
    pub color: [f32; 3],
}

impl SceneryBuilding {
    pub fn from_config(building: &SceneryConfig) -> Self {
        let position = Vec2::from(building.position);
        Self {
            kind: building.kind,
            footprint: Footprint::new(
                position,
                Vec2::new(building.size[0], building.size[2]) * 0.5,
            ),
            height: building.size[1],
            color: building.color,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionCatalog {
    pub sections: Vec<PointOfInterest>,
    pub scenery: Vec<SceneryBuilding>,
}

impl SectionCatalog {
    pub fn from_config(file: &SectionsFile) -> Self {
        Self {
            sections: file.sections.iter().map(PointOfInterest::from_config).collect(),
            scenery: file.scenery.iter().map(SceneryBuilding::from_config).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PointOfInterest> {
        self.sections.get(index)
    }

    // Sections first so footprint indices line up with `sections`.
    pub fn collision_footprints(&self) -> Vec<Footprint> {
        self.sections
            .iter()
            .map(|section| section.footprint)
            .chain(self.scenery.iter().map(|building| building.footprint))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProximityIndex {
    pub policy: ProximityPolicy,
}

impl ProximityIndex {
    pub fn new(policy: ProximityPolicy) -> Self {
        Self { policy }
    }

    pub fn find_nearest(&self, position: Vec2, sections: &[PointOfInterest]) -> Option<usize> {
        match self.policy {
            ProximityPolicy::FirstInCatalog => sections
                .iter()
                .position(|section| section.is_in_range(position)),
            ProximityPolicy::GloballyNearest => sections
                .iter()
                .enumerate()
                .filter(|(_, section)| section.is_in_range(position))
                .min_by(|(_, a), (_, b)| {
                    a.position
                        .distance_squared(position)
                        .total_cmp(&b.position.distance_squared(position))
                })
                .map(|(index, _)| index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_section;

    fn section_at(id: &str, position: [f32; 2], radius: f32) -> PointOfInterest {
        let mut config = sample_section(id, position);
        config.activation_radius = radius;
        PointOfInterest::from_config(&config)
    }

    #[test]
    fn activation_radius_is_strict() {
        let sections = [section_at("about", [100.0, 100.0], 8.0)];
        let index = ProximityIndex::default();

        assert_eq!(index.find_nearest(Vec2::new(107.9, 100.0), &sections), Some(0));
        assert_eq!(index.find_nearest(Vec2::new(100.0, 91.9), &sections), None);
        assert_eq!(index.find_nearest(Vec2::new(100.0, 108.0), &sections), None);

        let diagonal = Vec2::new(1.0, 1.0).normalize();
        assert_eq!(
            index.find_nearest(Vec2::splat(100.0) + diagonal * 7.9, &sections),
            Some(0)
        );
        assert_eq!(
            index.find_nearest(Vec2::splat(100.0) + diagonal * 8.1, &sections),
            None
        );
    }

    #[test]
    fn first_in_catalog_wins_when_radii_overlap() {
        let sections = [
            section_at("far", [0.0, 10.0], 12.0),
            section_at("near", [0.0, 2.0], 12.0),
        ];

        let first = ProximityIndex::new(ProximityPolicy::FirstInCatalog);
        let nearest = ProximityIndex::new(ProximityPolicy::GloballyNearest);

        assert_eq!(first.find_nearest(Vec2::ZERO, &sections), Some(0));
        assert_eq!(nearest.find_nearest(Vec2::ZERO, &sections), Some(1));
    }

    #[test]
    fn empty_catalog_has_no_nearest() {
        for policy in [ProximityPolicy::FirstInCatalog, ProximityPolicy::GloballyNearest] {
            assert_eq!(ProximityIndex::new(policy).find_nearest(Vec2::ZERO, &[]), None);
        }
    }

    #[test]
    fn catalog_lines_up_footprints_with_sections() {
        let mut file = SectionsFile {
            sections: vec![sample_section("about", [-50.0, -15.0])],
            scenery: Vec::new(),
        };
        file.scenery.push(SceneryConfig {
            kind: BuildingKind::Park,
            position: [30.0, 30.0],
            size: [10.0, 4.0, 10.0],
            color: [0.2, 0.7, 0.3],
        });

        let catalog = SectionCatalog::from_config(&file);
        let footprints = catalog.collision_footprints();

        assert_eq!(footprints.len(), 2);
        assert_eq!(footprints[0].center, Vec2::new(-50.0, -15.0));
        assert_eq!(footprints[0].half_extents, Vec2::new(9.0, 6.0));
        assert_eq!(catalog.sections[0].height, 25.0);
    }

    #[test]
    fn policy_and_kind_parse_from_snake_case() {
        #[derive(Deserialize)]
        struct Row {
            policy: ProximityPolicy,
            kind: BuildingKind,
        }

        let row: Row = toml::from_str("policy = \"globally_nearest\"\nkind = \"corporate\"")
            .expect("row should parse");

        assert_eq!(row.policy, ProximityPolicy::GloballyNearest);
        assert_eq!(row.kind, BuildingKind::Corporate);
    }
}
