use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use inkwell_core::DomainError;

use crate::schema::{default_config, validate_section_config};
use crate::section::{HomeSection, SectionId, SectionType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSection {
    pub section_type: SectionType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Falls back to the type's default config when absent.
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

/// Partial update; `None` leaves a field unchanged.
///
/// The schedule fields distinguish a missing key (unchanged) from an explicit
/// `null` (`Some(None)`, clears the bound).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub start_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub end_at: Option<Option<DateTime<Utc>>>,
}

/// Wrap whatever was sent, `null` included, so only an absent key stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn check_window(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<(), DomainError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end <= start {
            return Err(DomainError::validation("section must end after it starts"));
        }
    }
    Ok(())
}

/// The full set of home sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomeLayout {
    sections: Vec<HomeSection>,
    next_id: SectionId,
}

impl HomeLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, id: SectionId) -> Option<&HomeSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: SectionId) -> Result<&mut HomeSection, DomainError> {
        self.sections
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(DomainError::NotFound)
    }

    /// Append a section after the current last one.
    pub fn create(&mut self, new: NewSection, now: DateTime<Utc>) -> Result<&HomeSection, DomainError> {
        let config = match &new.config {
            Some(config) => validate_section_config(new.section_type, config)
                .map_err(|e| DomainError::validation(e.to_string()))?,
            None => default_config(new.section_type),
        };
        check_window(new.start_at, new.end_at)?;

        self.next_id += 1;
        let position = self.sections.iter().map(|s| s.position).max().unwrap_or(0) + 1;
        self.sections.push(HomeSection {
            id: self.next_id,
            section_type: new.section_type,
            title: new.title,
            subtitle: new.subtitle,
            config,
            position,
            active: new.active,
            start_at: new.start_at,
            end_at: new.end_at,
            updated_at: now,
        });

        let index = self.sections.len() - 1;
        Ok(&self.sections[index])
    }

    pub fn update(
        &mut self,
        id: SectionId,
        update: SectionUpdate,
        now: DateTime<Utc>,
    ) -> Result<&HomeSection, DomainError> {
        let section = self.get_mut(id)?;
        let config = match &update.config {
            Some(config) => Some(
                validate_section_config(section.section_type, config)
                    .map_err(|e| DomainError::validation(e.to_string()))?,
            ),
            None => None,
        };
        let start_at = update.start_at.unwrap_or(section.start_at);
        let end_at = update.end_at.unwrap_or(section.end_at);
        check_window(start_at, end_at)?;

        if let Some(title) = update.title {
            section.title = Some(title).filter(|t| !t.trim().is_empty());
        }
        if let Some(subtitle) = update.subtitle {
            section.subtitle = Some(subtitle).filter(|t| !t.trim().is_empty());
        }
        if let Some(config) = config {
            section.config = config;
        }
        if let Some(active) = update.active {
            section.active = active;
        }
        section.start_at = start_at;
        section.end_at = end_at;
        section.updated_at = now;
        Ok(&*section)
    }

    /// Apply new positions. Ids not in the layout are skipped.
    pub fn reorder(&mut self, positions: &[(SectionId, i32)], now: DateTime<Utc>) -> usize {
        let mut moved = 0;
        for (id, position) in positions {
            if let Some(section) = self.sections.iter_mut().find(|s| s.id == *id) {
                section.position = *position;
                section.updated_at = now;
                moved += 1;
            }
        }
        moved
    }

    /// Flip the active flag; returns the new value.
    pub fn toggle(&mut self, id: SectionId, now: DateTime<Utc>) -> Result<bool, DomainError> {
        let section = self.get_mut(id)?;
        section.active = !section.active;
        section.updated_at = now;
        Ok(section.active)
    }

    pub fn delete(&mut self, id: SectionId) -> Result<HomeSection, DomainError> {
        let index = self
            .sections
            .iter()
            .position(|s| s.id == id)
            .ok_or(DomainError::NotFound)?;
        Ok(self.sections.remove(index))
    }

    /// All sections by position, ties broken by id.
    pub fn ordered(&self) -> Vec<&HomeSection> {
        let mut out: Vec<&HomeSection> = self.sections.iter().collect();
        out.sort_by_key(|s| (s.position, s.id));
        out
    }

    /// What the home page shows at `now`.
    pub fn visible(&self, now: DateTime<Utc>) -> Vec<&HomeSection> {
        self.ordered()
            .into_iter()
            .filter(|s| s.is_scheduled_active(now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn new(section_type: SectionType) -> NewSection {
        NewSection {
            section_type,
            title: None,
            subtitle: None,
            config: None,
            active: true,
            start_at: None,
            end_at: None,
        }
    }

    #[test]
    fn create_appends_with_defaults() {
        let now = Utc::now();
        let mut layout = HomeLayout::new();
        let a = layout.create(new(SectionType::HeroSlider), now).unwrap().id;
        let b = layout.create(new(SectionType::NewsletterBar), now).unwrap().id;

        let ordered: Vec<_> = layout.ordered().iter().map(|s| (s.id, s.position)).collect();
        assert_eq!(ordered, vec![(a, 1), (b, 2)]);
        assert_eq!(
            layout.get(b).and_then(|s| s.config_value("submit_label")),
            Some(&json!("Subscribe"))
        );
    }

    #[test]
    fn create_rejects_bad_config() {
        let mut layout = HomeLayout::new();
        let mut bad = new(SectionType::Bestsellers);
        bad.config = Some(json!({ "limit": "eight" }));
        assert!(matches!(
            layout.create(bad, Utc::now()),
            Err(DomainError::Validation(msg)) if msg.contains("limit must be of type integer")
        ));
        assert!(layout.is_empty());
    }

    #[test]
    fn reorder_ignores_unknown_ids() {
        let now = Utc::now();
        let mut layout = HomeLayout::new();
        let a = layout.create(new(SectionType::TrustBadges), now).unwrap().id;
        let b = layout.create(new(SectionType::InfoStrip), now).unwrap().id;

        assert_eq!(layout.reorder(&[(a, 5), (b, 1), (999, 0)], now), 2);
        let ids: Vec<_> = layout.ordered().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn visible_respects_toggle_and_schedule() {
        let now = Utc::now();
        let mut layout = HomeLayout::new();
        let a = layout.create(new(SectionType::HeroSlider), now).unwrap().id;
        let mut later = new(SectionType::DealsOfDay);
        later.start_at = Some(now + Duration::days(1));
        layout.create(later, now).unwrap();
        let c = layout.create(new(SectionType::Testimonials), now).unwrap().id;

        assert_eq!(layout.toggle(a, now), Ok(false));
        let ids: Vec<_> = layout.visible(now).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![c]);
    }

    #[test]
    fn update_and_delete() {
        let now = Utc::now();
        let mut layout = HomeLayout::new();
        let id = layout.create(new(SectionType::QuickOrderIsbn), now).unwrap().id;

        let update = SectionUpdate {
            title: Some("Order by ISBN".into()),
            config: Some(json!({ "enable_scanner": true })),
            ..SectionUpdate::default()
        };
        let s = layout.update(id, update, now).unwrap();
        assert_eq!(s.title.as_deref(), Some("Order by ISBN"));
        assert_eq!(s.config_value("enable_scanner"), Some(&json!(true)));

        let bad_window = SectionUpdate {
            start_at: Some(Some(now)),
            end_at: Some(Some(now - Duration::hours(1))),
            ..SectionUpdate::default()
        };
        assert!(layout.update(id, bad_window, now).is_err());

        layout.delete(id).unwrap();
        assert_eq!(layout.delete(id), Err(DomainError::NotFound));
        assert_eq!(layout.toggle(id, now), Err(DomainError::NotFound));
    }

    #[test]
    fn explicit_null_clears_schedule_and_missing_key_keeps_it() {
        let now = Utc::now();
        let mut layout = HomeLayout::new();
        let mut scheduled = new(SectionType::DealsOfDay);
        scheduled.start_at = Some(now - Duration::days(1));
        scheduled.end_at = Some(now + Duration::days(1));
        let id = layout.create(scheduled, now).unwrap().id;

        let untouched: SectionUpdate = serde_json::from_value(json!({ "title": "Deals" })).unwrap();
        assert_eq!(untouched.end_at, None);
        let s = layout.update(id, untouched, now).unwrap();
        assert_eq!(s.end_at, Some(now + Duration::days(1)));

        let cleared: SectionUpdate = serde_json::from_value(json!({ "end_at": null })).unwrap();
        assert_eq!(cleared.end_at, Some(None));
        assert_eq!(cleared.start_at, None);
        let s = layout.update(id, cleared, now).unwrap();
        assert_eq!(s.end_at, None);
        assert_eq!(s.start_at, Some(now - Duration::days(1)));
        assert!(layout.get(id).is_some_and(|s| s.is_scheduled_active(now + Duration::days(30))));
    }
}
