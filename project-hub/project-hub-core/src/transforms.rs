//! Normalizations applied to a freshly opened project, in a fixed order.

use crate::config::HubConfig;
use crate::project::ProjectModel;
use crate::ui::Message;

pub trait ProjectTransform: Send + Sync {
    fn name(&self) -> &'static str;
    /// Rewrite `model` in place; returns a note for the status line.
    fn apply(&self, model: &mut ProjectModel) -> Option<Message>;
}

/// Older files mark milestones only by a zero duration.
pub struct LegacyMilestones {
    pub enabled: bool,
}

impl ProjectTransform for LegacyMilestones {
    fn name(&self) -> &'static str {
        "legacy-milestones"
    }

    fn apply(&self, model: &mut ProjectModel) -> Option<Message> {
        if !self.enabled {
            return None;
        }
        let mut converted = 0;
        for task in model.tasks.iter_mut() {
            if task.duration == 0 && task.milestone.is_none() {
                task.milestone = Some(true);
                converted += 1;
            }
        }
        (converted > 0).then(|| Message::new("project.open.legacyMilestones").arg(converted))
    }
}

pub struct EarliestStartConstraints {
    pub reset: bool,
}

impl ProjectTransform for EarliestStartConstraints {
    fn name(&self) -> &'static str {
        "earliest-start-constraints"
    }

    fn apply(&self, model: &mut ProjectModel) -> Option<Message> {
        let constrained = model
            .tasks
            .iter()
            .filter(|t| t.earliest_start.is_some())
            .count();
        if constrained == 0 {
            return None;
        }
        if self.reset {
            for task in model.tasks.iter_mut() {
                task.earliest_start = None;
            }
            Some(Message::new("project.open.earliestStart.reset").arg(constrained))
        } else {
            Some(Message::new("project.open.earliestStart.present").arg(constrained))
        }
    }
}

pub struct PostOpenChain {
    transforms: Vec<Box<dyn ProjectTransform>>,
}

impl PostOpenChain {
    /// Legacy milestones first, then earliest-start constraints.
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            transforms: vec![
                Box::new(LegacyMilestones {
                    enabled: config.convert_legacy_milestones,
                }),
                Box::new(EarliestStartConstraints {
                    reset: config.reset_earliest_start,
                }),
            ],
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn run(&self, model: &mut ProjectModel) -> Vec<Message> {
        self.transforms
            .iter()
            .filter_map(|t| t.apply(model))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::TaskRecord;
    use chrono::NaiveDate;

    fn task(name: &str, duration: u32) -> TaskRecord {
        TaskRecord {
            name: name.into(),
            duration,
            ..Default::default()
        }
    }

    #[test]
    fn zero_duration_tasks_become_milestones() {
        let mut model = ProjectModel {
            tasks: vec![
                task("kickoff", 0),
                task("build", 5),
                TaskRecord {
                    milestone: Some(false),
                    ..task("draft", 0)
                },
            ],
            ..Default::default()
        };
        let note = LegacyMilestones { enabled: true }.apply(&mut model).unwrap();
        assert_eq!(note.args, vec!["1"]);
        assert_eq!(model.tasks[0].milestone, Some(true));
        assert_eq!(model.tasks[1].milestone, None);
        assert_eq!(model.tasks[2].milestone, Some(false));
    }

    #[test]
    fn disabled_conversion_leaves_model_alone() {
        let mut model = ProjectModel {
            tasks: vec![task("kickoff", 0)],
            ..Default::default()
        };
        assert!(LegacyMilestones { enabled: false }.apply(&mut model).is_none());
        assert_eq!(model.tasks[0].milestone, None);
    }

    #[test]
    fn earliest_start_reset_is_optional() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1);
        let mut model = ProjectModel {
            tasks: vec![TaskRecord {
                earliest_start: date,
                ..task("a", 2)
            }],
            ..Default::default()
        };
        let note = EarliestStartConstraints { reset: false }.apply(&mut model).unwrap();
        assert_eq!(note.key, "project.open.earliestStart.present");
        assert_eq!(model.tasks[0].earliest_start, date);

        let note = EarliestStartConstraints { reset: true }.apply(&mut model).unwrap();
        assert_eq!(note.key, "project.open.earliestStart.reset");
        assert_eq!(model.tasks[0].earliest_start, None);
    }

    #[test]
    fn chain_order_is_fixed() {
        let chain = PostOpenChain::from_config(&HubConfig::default());
        assert_eq!(chain.names(), vec!["legacy-milestones", "earliest-start-constraints"]);
    }
}
