use crate::animation::direction;
use crate::assets::{
    AnimationDefinition, ColorPolicy, DirectionCase, Keyframe, LayerKind, ParticleLibrary,
};
use crate::easing::EasingService;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Where the issue was found, e.g. `walk/case 2/layer 'arm'/keyframe 3`.
    pub location: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(severity: Severity, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity, location: location.into(), message: message.into() }
    }
}

/// What kind of definition a JSON document holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefinitionKind {
    Animation,
    Particles,
    Unknown,
}

pub fn classify_json(bytes: &[u8]) -> DefinitionKind {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) if map.get("motions").is_some_and(Value::is_array) => DefinitionKind::Animation,
        Ok(Value::Object(map)) if !map.is_empty() && map.values().all(|v| v.get("layers").is_some_and(Value::is_array)) => {
            DefinitionKind::Particles
        }
        _ => DefinitionKind::Unknown,
    }
}

/// Structural checks over authored definitions. Checks never stop at the first problem.
pub struct DefinitionValidator<'a> {
    easing: &'a dyn EasingService,
    particles: Option<&'a ParticleLibrary>,
}

impl<'a> DefinitionValidator<'a> {
    pub fn new(easing: &'a dyn EasingService) -> Self {
        Self { easing, particles: None }
    }

    /// Cross-checks particle layers against `library`.
    pub fn with_particles(mut self, library: &'a ParticleLibrary) -> Self {
        self.particles = Some(library);
        self
    }

    pub fn validate_path(&self, path: &Path) -> Vec<ValidationIssue> {
        let location = path.display().to_string();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => return vec![ValidationIssue::new(Severity::Error, location, format!("Failed to read: {err}"))],
        };
        match classify_json(&bytes) {
            DefinitionKind::Animation => match AnimationDefinition::from_json_slice(&bytes) {
                Ok(definition) => self.validate_animation(&definition),
                Err(err) => vec![ValidationIssue::new(Severity::Error, location, format!("{err:#}"))],
            },
            DefinitionKind::Particles => match ParticleLibrary::from_json_slice(&bytes) {
                Ok(library) => self.validate_particles(&library),
                Err(err) => vec![ValidationIssue::new(Severity::Error, location, format!("{err:#}"))],
            },
            DefinitionKind::Unknown => {
                vec![ValidationIssue::new(Severity::Info, location, "Not an animation or particle definition.")]
            }
        }
    }

    pub fn validate_animation(&self, definition: &AnimationDefinition) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if definition.motions().is_empty() {
            issues.push(ValidationIssue::new(Severity::Warning, "definition", "No motions defined."));
        }
        for motion in definition.motions() {
            let location = motion.name.clone();
            match direction::template(&motion.direction_mode) {
                Some(template) => {
                    let required = template.required_cases();
                    if motion.cases.len() < required {
                        issues.push(ValidationIssue::new(
                            Severity::Error,
                            &location,
                            format!(
                                "Direction mode '{}' needs {required} direction cases, found {}.",
                                template.name,
                                motion.cases.len()
                            ),
                        ));
                    } else if motion.cases.len() > required {
                        issues.push(ValidationIssue::new(
                            Severity::Info,
                            &location,
                            format!("{} direction cases are never used.", motion.cases.len() - required),
                        ));
                    }
                }
                None => issues.push(ValidationIssue::new(
                    Severity::Warning,
                    &location,
                    format!("Unknown direction mode '{}'; players fall back to 1-dir.", motion.direction_mode),
                )),
            }
            for (index, case) in motion.cases.iter().enumerate() {
                self.validate_case(definition, case, &format!("{location}/case {index}"), &mut issues);
            }
        }
        issues
    }

    fn validate_case(
        &self,
        definition: &AnimationDefinition,
        case: &DirectionCase,
        location: &str,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let length = case.length() as f32;
        for node in case.nodes() {
            let layer = format!("{location}/{} '{}'", node.kind.label(), node.name);
            let windows = node.kind.windows();
            for (index, (start, end)) in windows.iter().enumerate() {
                let key = format!("{layer}/keyframe {index}");
                if !(end > start) {
                    issues.push(ValidationIssue::new(Severity::Error, &key, format!("Empty window [{start}, {end}).")));
                }
                if *start >= length {
                    issues.push(ValidationIssue::new(
                        Severity::Warning,
                        &key,
                        format!("Starts at {start}, past the case length {length}; it never plays."),
                    ));
                }
                if let Some((next_start, _)) = windows.get(index + 1) {
                    if next_start < end {
                        issues.push(ValidationIssue::new(
                            Severity::Error,
                            &key,
                            format!("Overlaps the next keyframe ({end} > {next_start})."),
                        ));
                    }
                }
            }
            match &node.kind {
                LayerKind::Joint { keyframes, .. } => self.check_easing(keyframes, &layer, issues),
                LayerKind::Sprite { sprite, keyframes } => {
                    self.check_easing(keyframes, &layer, issues);
                    if definition.sprite(*sprite).is_none() {
                        issues.push(ValidationIssue::new(
                            Severity::Error,
                            &layer,
                            format!("Refers to missing sprite sheet {sprite}."),
                        ));
                    }
                }
                LayerKind::Particle { effect, keyframes } => {
                    self.check_easing(keyframes, &layer, issues);
                    if let Some(library) = self.particles {
                        if !library.contains(effect) {
                            issues.push(ValidationIssue::new(
                                Severity::Warning,
                                &layer,
                                format!("Particle effect '{effect}' is not in the library."),
                            ));
                        }
                    }
                }
                LayerKind::Sound { clip, keyframes } => {
                    self.check_easing(keyframes, &layer, issues);
                    if clip.is_empty() {
                        issues.push(ValidationIssue::new(Severity::Warning, &layer, "Sound layer has no clip."));
                    }
                }
            }
        }
    }

    fn check_easing<P>(&self, keyframes: &[Keyframe<P>], layer: &str, issues: &mut Vec<ValidationIssue>) {
        for (index, keyframe) in keyframes.iter().enumerate() {
            if let Some(id) = keyframe.easing.as_deref() {
                if self.easing.get(id).is_none() {
                    issues.push(ValidationIssue::new(
                        Severity::Warning,
                        format!("{layer}/keyframe {index}"),
                        format!("Unknown easing '{id}'; values are held."),
                    ));
                }
            }
        }
    }

    pub fn validate_particles(&self, library: &ParticleLibrary) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut ids: Vec<&str> = library.ids().collect();
        ids.sort_unstable();
        for id in ids {
            let Some(effect) = library.get(id) else {
                continue;
            };
            if effect.layers.is_empty() {
                issues.push(ValidationIssue::new(Severity::Warning, id, "Effect has no layers."));
            }
            for (index, layer) in effect.layers.iter().enumerate() {
                let location = format!("{id}/layer {index}");
                let mut push = |severity, message: String| issues.push(ValidationIssue::new(severity, &location, message));
                if !layer.interval.is_finite() {
                    push(Severity::Warning, "Non-finite interval; the layer never spawns.".to_string());
                } else if layer.interval <= 0.0 && layer.count.is_none() {
                    push(Severity::Warning, "Zero interval without a count refills to the maximum every tick.".to_string());
                }
                if layer.lifetime.mean <= 0.0 {
                    push(Severity::Warning, format!("Lifetime {} ms expires particles immediately.", layer.lifetime.mean));
                }
                if layer.maximum == 0 {
                    push(Severity::Warning, "Maximum of 0 active particles.".to_string());
                }
                if layer.sprite.cell_width <= 0.0 || layer.sprite.cell_height <= 0.0 {
                    push(Severity::Error, "Sprite cell size must be positive.".to_string());
                }
                match &layer.color {
                    ColorPolicy::Texture { pixels } if pixels.is_empty() => {
                        push(Severity::Warning, "Color texture has no pixels.".to_string());
                    }
                    ColorPolicy::Easing { easing, alpha_easing, .. } => {
                        for id in std::iter::once(easing.as_str()).chain(alpha_easing.as_deref()) {
                            if self.easing.get(id).is_none() {
                                push(Severity::Warning, format!("Unknown color easing '{id}'; linear is used."));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        issues
    }
}

pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|issue| issue.severity == Severity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{JointParams, Layer, Motion, ParticleEffectDefinition, ParticleLayerDefinition};
    use crate::easing::EasingTable;

    fn joint(keyframes: Vec<Keyframe<JointParams>>) -> Layer {
        Layer::Joint { name: "root".into(), keyframes, children: Vec::new() }
    }

    #[test]
    fn severity_display_formats() {
        assert_eq!(Severity::Info.to_string(), "info");
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(Severity::Error.to_string(), "error");
    }

    #[test]
    fn overlapping_keyframes_are_errors() {
        let case = DirectionCase::new(
            vec![joint(vec![Keyframe::new(0.0, 10.0), Keyframe::new(5.0, 12.0).with_easing("bogus")])],
            12,
            0.0,
        );
        let definition = AnimationDefinition::new(Vec::new(), Vec::new(), vec![Motion::new("idle", "1-dir", vec![case])]);
        let easing = EasingTable::with_builtins();
        let issues = DefinitionValidator::new(&easing).validate_animation(&definition);
        assert!(has_errors(&issues));
        assert!(issues.iter().any(|issue| issue.message.contains("Overlaps")));
        assert!(issues.iter().any(|issue| issue.message.contains("bogus")));
    }

    #[test]
    fn missing_direction_cases_are_reported() {
        let case = DirectionCase::new(vec![joint(vec![Keyframe::new(0.0, 4.0)])], 4, 0.0);
        let definition = AnimationDefinition::new(Vec::new(), Vec::new(), vec![Motion::new("walk", "4-dir", vec![case])]);
        let easing = EasingTable::with_builtins();
        let issues = DefinitionValidator::new(&easing).validate_animation(&definition);
        assert!(issues.iter().any(|issue| issue.severity == Severity::Error && issue.message.contains("needs 4")));
    }

    #[test]
    fn particle_layers_flag_degenerate_intervals() {
        let mut library = ParticleLibrary::new();
        library.insert(
            "burst",
            ParticleEffectDefinition::new("burst", vec![ParticleLayerDefinition::simple("spark", 0.0, 100.0)]),
        );
        let easing = EasingTable::with_builtins();
        let issues = DefinitionValidator::new(&easing).validate_particles(&library);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location, "burst/layer 0");
    }

    #[test]
    fn classify_recognizes_both_definition_kinds() {
        assert_eq!(classify_json(br#"{"motions": []}"#), DefinitionKind::Animation);
        assert_eq!(classify_json(br#"{"smoke": {"layers": []}}"#), DefinitionKind::Particles);
        assert_eq!(classify_json(br#"[1, 2]"#), DefinitionKind::Unknown);
    }
}
