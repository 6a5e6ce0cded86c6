use std::f32::consts::TAU;

/// Logical direction → authored direction case, plus whether the case is drawn mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionEntry {
    pub case: usize,
    pub mirror: bool,
}

const fn entry(case: usize, mirror: bool) -> DirectionEntry {
    DirectionEntry { case, mirror }
}

/// Named direction layout.
///
/// Logical direction 0 faces +x and indices increase with the angle, so for `N` directions
/// direction `d` is centered on `d * 2π / N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionTemplate {
    pub name: &'static str,
    pub entries: &'static [DirectionEntry],
    /// The whole sprite rotates to the facing angle.
    pub rotates: bool,
}

impl DirectionTemplate {
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, direction: usize) -> Option<DirectionEntry> {
        self.entries.get(direction).copied()
    }

    /// Number of distinct direction cases an author has to draw.
    pub fn required_cases(&self) -> usize {
        self.entries.iter().map(|entry| entry.case + 1).max().unwrap_or(0)
    }
}

const FREE: &[DirectionEntry] = &[entry(0, false)];
const ONE: &[DirectionEntry] = &[entry(0, false)];
// right, left
const TWO: &[DirectionEntry] = &[entry(0, false), entry(0, true)];
// right, down, left, up; left mirrors right
const THREE: &[DirectionEntry] = &[entry(0, false), entry(1, false), entry(0, true), entry(2, false)];
const FOUR: &[DirectionEntry] = &[entry(0, false), entry(1, false), entry(2, false), entry(3, false)];
// eight facings drawn from right, down-right, down, up-right, up
const FIVE: &[DirectionEntry] = &[
    entry(0, false),
    entry(1, false),
    entry(2, false),
    entry(1, true),
    entry(0, true),
    entry(3, true),
    entry(4, false),
    entry(3, false),
];
// hex facings drawn from right, down-right, up-right
const SIX: &[DirectionEntry] =
    &[entry(0, false), entry(1, false), entry(1, true), entry(0, true), entry(2, true), entry(2, false)];
const EIGHT: &[DirectionEntry] = &[
    entry(0, false),
    entry(1, false),
    entry(2, false),
    entry(3, false),
    entry(4, false),
    entry(5, false),
    entry(6, false),
    entry(7, false),
];

pub const TEMPLATES: &[DirectionTemplate] = &[
    DirectionTemplate { name: "free", entries: FREE, rotates: true },
    DirectionTemplate { name: "1-dir", entries: ONE, rotates: false },
    DirectionTemplate { name: "2-dir", entries: TWO, rotates: false },
    DirectionTemplate { name: "3-dir", entries: THREE, rotates: false },
    DirectionTemplate { name: "4-dir", entries: FOUR, rotates: false },
    DirectionTemplate { name: "5-dir", entries: FIVE, rotates: false },
    DirectionTemplate { name: "6-dir", entries: SIX, rotates: false },
    DirectionTemplate { name: "8-dir", entries: EIGHT, rotates: false },
];

pub fn template(name: &str) -> Option<&'static DirectionTemplate> {
    TEMPLATES.iter().find(|template| template.name == name)
}

static SINGLE: DirectionTemplate = DirectionTemplate { name: "1-dir", entries: ONE, rotates: false };

/// The named template, or `1-dir` when the name is unknown.
pub fn template_or_default(name: &str) -> &'static DirectionTemplate {
    template(name).unwrap_or(&SINGLE)
}

/// Hysteresis band around a section boundary, in sections.
pub const BOUNDARY_EPSILON: f32 = 0.01;

/// Resolves the facing for `angle`, keeping `current` when the angle sits on a boundary next to it.
pub fn resolve_direction(angle: f32, count: usize, current: Option<usize>) -> Option<usize> {
    if count == 0 || !angle.is_finite() {
        return current;
    }
    let n = count as f32;
    let section = (angle / TAU * n + 0.5).rem_euclid(n);
    if let Some(direction) = current {
        if (section - section.round()).abs() < BOUNDARY_EPSILON {
            let distance = (section - (direction as f32 + 0.5)).abs();
            if distance < 1.0 || distance > n - 1.0 {
                return Some(direction);
            }
        }
    }
    Some((section.floor() as usize) % count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_reference_contiguous_cases() {
        for template in TEMPLATES {
            let required = template.required_cases();
            for case in 0..required {
                assert!(
                    template.entries.iter().any(|entry| entry.case == case),
                    "{} skips case {case}",
                    template.name
                );
            }
        }
        assert_eq!(template("5-dir").map(|t| t.required_cases()), Some(5));
        assert_eq!(template("3-dir").map(|t| t.required_cases()), Some(3));
        assert!(template("7-dir").is_none());
    }

    #[test]
    fn angles_map_to_centered_sections() {
        assert_eq!(resolve_direction(0.0, 4, None), Some(0));
        assert_eq!(resolve_direction(TAU * 0.25, 4, None), Some(1));
        assert_eq!(resolve_direction(TAU * 0.5, 4, None), Some(2));
        assert_eq!(resolve_direction(-TAU * 0.25, 4, None), Some(3));
        assert_eq!(resolve_direction(TAU * 0.1, 4, None), Some(0));
        assert_eq!(resolve_direction(1.0, 0, Some(2)), Some(2), "zero directions keeps state");
    }

    #[test]
    fn boundary_keeps_neighbouring_direction() {
        // Boundary between 0 and 1 in 4-dir sits at 45 degrees.
        let boundary = TAU / 8.0;
        assert_eq!(resolve_direction(boundary + 0.001, 4, Some(0)), Some(0));
        assert_eq!(resolve_direction(boundary - 0.001, 4, Some(1)), Some(1));
        // Far from the current direction the boundary rule does not apply.
        assert_eq!(resolve_direction(boundary + 0.001, 4, Some(3)), Some(1));
    }
}
