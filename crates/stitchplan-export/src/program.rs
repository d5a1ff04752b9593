//! Lowering an [`Embroidery`] into a flat stitch program.
//!
//! Machine embroidery formats describe a design as a list of needle
//! commands in integer units of 0.1 mm. [`StitchProgram`] is that list,
//! independent of any particular file layout:
//!
//! - one [`Command::Stitch`] per needle position,
//! - a [`Command::ColorChange`] between threads,
//! - a final [`Command::End`].
//!
//! Coordinates are translated so the centre of the design's bounding box
//! sits at the origin.

use serde::{Deserialize, Serialize};

use stitchplan_pipeline::{Argb, Embroidery};

/// Program units per millimetre.
pub const UNITS_PER_MM: f64 = 10.0;

/// One needle command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Move the needle to `(x, y)` and stitch, in 0.1 mm units.
    Stitch {
        /// Horizontal position.
        x: i32,
        /// Vertical position.
        y: i32,
    },
    /// Stop and switch to the next thread in the color table.
    ColorChange,
    /// End of design.
    End,
}

/// Axis-aligned extent of a program, in 0.1 mm units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    /// Smallest x.
    pub min_x: i32,
    /// Smallest y.
    pub min_y: i32,
    /// Largest x.
    pub max_x: i32,
    /// Largest y.
    pub max_y: i32,
}

impl Bounds {
    /// Horizontal extent.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.max_x.saturating_sub(self.min_x)
    }

    /// Vertical extent.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.max_y.saturating_sub(self.min_y)
    }

    fn including(points: &[(i32, i32)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut bounds = Self {
            min_x: x0,
            min_y: y0,
            max_x: x0,
            max_y: y0,
        };
        for &(x, y) in rest {
            bounds.min_x = bounds.min_x.min(x);
            bounds.min_y = bounds.min_y.min(y);
            bounds.max_x = bounds.max_x.max(x);
            bounds.max_y = bounds.max_y.max(y);
        }
        Some(bounds)
    }
}

/// A design lowered to needle commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchProgram {
    /// Design name.
    pub name: String,
    /// Thread colors, one per [`Command::ColorChange`]-separated block.
    pub colors: Vec<Argb>,
    /// Needle commands, always terminated by [`Command::End`].
    pub commands: Vec<Command>,
    /// Extent of the centred stitches.
    pub bounds: Bounds,
}

impl StitchProgram {
    /// Lower `embroidery` into needle commands.
    ///
    /// Positions come from [`Embroidery::absolute_threads`], so a
    /// relative thread continues from the last stitch before it.
    /// Threads without stitches contribute nothing, not even a color
    /// change.
    ///
    /// # Examples
    ///
    /// ```
    /// use stitchplan_export::{Command, StitchProgram};
    /// use stitchplan_pipeline::{Argb, Embroidery, Point, Thread};
    ///
    /// let embroidery = Embroidery {
    ///     name: "line".to_string(),
    ///     threads: vec![Thread::absolute(
    ///         Argb::BLACK,
    ///         vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
    ///     )],
    /// };
    /// let program = StitchProgram::from_embroidery(&embroidery);
    /// assert_eq!(
    ///     program.commands,
    ///     vec![
    ///         Command::Stitch { x: -50, y: 0 },
    ///         Command::Stitch { x: 50, y: 0 },
    ///         Command::End,
    ///     ]
    /// );
    /// ```
    #[must_use]
    pub fn from_embroidery(embroidery: &Embroidery) -> Self {
        let blocks: Vec<(Argb, Vec<(i32, i32)>)> = embroidery
            .absolute_threads()
            .into_iter()
            .filter(|t| !t.stitches.is_empty())
            .map(|t| {
                let units = t
                    .stitches
                    .iter()
                    .map(|p| (to_units(p.x), to_units(p.y)))
                    .collect();
                (t.color, units)
            })
            .collect();

        let all: Vec<(i32, i32)> = blocks.iter().flat_map(|(_, s)| s.iter().copied()).collect();
        let Some(raw) = Bounds::including(&all) else {
            return Self {
                name: embroidery.name.clone(),
                colors: Vec::new(),
                commands: vec![Command::End],
                bounds: Bounds::default(),
            };
        };
        let cx = midpoint(raw.min_x, raw.max_x);
        let cy = midpoint(raw.min_y, raw.max_y);

        let mut commands = Vec::with_capacity(all.len() + blocks.len() + 1);
        for (i, (_, stitches)) in blocks.iter().enumerate() {
            if i > 0 {
                commands.push(Command::ColorChange);
            }
            commands.extend(stitches.iter().map(|&(x, y)| Command::Stitch {
                x: x.saturating_sub(cx),
                y: y.saturating_sub(cy),
            }));
        }
        commands.push(Command::End);

        Self {
            name: embroidery.name.clone(),
            colors: blocks.iter().map(|(c, _)| *c).collect(),
            commands,
            bounds: Bounds {
                min_x: raw.min_x.saturating_sub(cx),
                min_y: raw.min_y.saturating_sub(cy),
                max_x: raw.max_x.saturating_sub(cx),
                max_y: raw.max_y.saturating_sub(cy),
            },
        }
    }

    /// Number of [`Command::Stitch`] commands.
    #[must_use]
    pub fn stitch_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Stitch { .. }))
            .count()
    }

    /// Number of [`Command::ColorChange`] commands.
    #[must_use]
    pub fn color_change_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::ColorChange))
            .count()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_units(mm: f64) -> i32 {
    // `as` saturates at the i32 range and maps NaN to 0.
    (mm * UNITS_PER_MM).round() as i32
}

fn midpoint(a: i32, b: i32) -> i32 {
    let mid = (i64::from(a) + i64::from(b)).div_euclid(2);
    i32::try_from(mid).unwrap_or(a)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stitchplan_pipeline::{Point, Thread};

    use super::*;

    const RED: Argb = Argb::rgb(255, 0, 0);
    const BLUE: Argb = Argb::rgb(0, 0, 255);

    fn embroidery(threads: Vec<Thread>) -> Embroidery {
        Embroidery {
            name: "test".to_string(),
            threads,
        }
    }

    #[test]
    fn empty_embroidery_is_just_end() {
        let program = StitchProgram::from_embroidery(&embroidery(vec![]));
        assert_eq!(program.commands, vec![Command::End]);
        assert!(program.colors.is_empty());
        assert_eq!(program.bounds, Bounds::default());
        assert_eq!(program.stitch_count(), 0);
    }

    #[test]
    fn color_change_only_between_threads() {
        let program = StitchProgram::from_embroidery(&embroidery(vec![
            Thread::absolute(RED, vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]),
            Thread::absolute(BLUE, vec![Point::new(1.0, 1.0)]),
        ]));
        assert_eq!(program.colors, vec![RED, BLUE]);
        assert_eq!(program.color_change_count(), 1);
        assert_eq!(program.stitch_count(), 3);
        assert!(matches!(program.commands.first(), Some(Command::Stitch { .. })));
        assert_eq!(program.commands[2], Command::ColorChange);
        assert_eq!(program.commands.last(), Some(&Command::End));
    }

    #[test]
    fn threads_without_stitches_are_skipped() {
        let program = StitchProgram::from_embroidery(&embroidery(vec![
            Thread::absolute(RED, vec![]),
            Thread::absolute(BLUE, vec![Point::new(2.0, 2.0)]),
        ]));
        assert_eq!(program.colors, vec![BLUE]);
        assert_eq!(program.color_change_count(), 0);
    }

    #[test]
    fn design_is_centred_on_origin() {
        let program = StitchProgram::from_embroidery(&embroidery(vec![Thread::absolute(
            RED,
            vec![Point::new(10.0, 20.0), Point::new(30.0, 60.0)],
        )]));
        assert_eq!(
            program.bounds,
            Bounds {
                min_x: -100,
                min_y: -200,
                max_x: 100,
                max_y: 200,
            }
        );
        assert_eq!(program.bounds.width(), 200);
        assert_eq!(program.bounds.height(), 400);
    }

    #[test]
    fn millimetres_round_to_tenths() {
        let program = StitchProgram::from_embroidery(&embroidery(vec![Thread::absolute(
            RED,
            vec![Point::new(0.0, 0.0), Point::new(0.26, 0.04)],
        )]));
        // Raw units (0, 0) and (3, 0); centre (1, 0).
        assert_eq!(
            &program.commands[..2],
            &[Command::Stitch { x: -1, y: 0 }, Command::Stitch { x: 2, y: 0 }]
        );
    }

    #[test]
    fn mixed_threads_agree_with_absolute_stitches() {
        let e = embroidery(vec![
            Thread::absolute(RED, vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)]),
            Thread {
                color: BLUE,
                stitches: vec![Point::new(1.0, 0.0)],
                absolute: false,
            },
        ]);
        let program = StitchProgram::from_embroidery(&e);
        // Raw units (0,0) (100,100) (110,100); centre (55, 50).
        assert_eq!(
            program.commands,
            vec![
                Command::Stitch { x: -55, y: -50 },
                Command::Stitch { x: 45, y: 50 },
                Command::ColorChange,
                Command::Stitch { x: 55, y: 50 },
                Command::End,
            ]
        );
        let expected: Vec<Command> = e
            .absolute_stitches()
            .map(|p| Command::Stitch {
                x: to_units(p.x) - 55,
                y: to_units(p.y) - 50,
            })
            .collect();
        let stitches: Vec<Command> = program
            .commands
            .iter()
            .copied()
            .filter(|c| matches!(c, Command::Stitch { .. }))
            .collect();
        assert_eq!(stitches, expected);
    }

    #[test]
    fn relative_threads_continue_from_needle() {
        let absolute = Thread::absolute(RED, vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0)]);
        let relative = Thread::absolute(BLUE, vec![Point::new(5.0, 5.0), Point::new(0.0, 5.0)])
            .to_relative(Point::default());
        // Deltas from the origin, but the needle sits at (5, 0).
        let program = StitchProgram::from_embroidery(&embroidery(vec![absolute, relative]));
        let stitches: Vec<Command> = program
            .commands
            .iter()
            .copied()
            .filter(|c| matches!(c, Command::Stitch { .. }))
            .collect();
        // Raw units: (0,0) (50,0) (100,50) (50,50); centre (50, 25).
        assert_eq!(
            stitches,
            vec![
                Command::Stitch { x: -50, y: -25 },
                Command::Stitch { x: 0, y: -25 },
                Command::Stitch { x: 50, y: 25 },
                Command::Stitch { x: 0, y: 25 },
            ]
        );
    }

    #[test]
    fn command_serializes_with_type_tag() {
        let json = serde_json::to_string(&Command::Stitch { x: 1, y: -2 }).unwrap();
        assert_eq!(json, r#"{"type":"stitch","x":1,"y":-2}"#);
        let json = serde_json::to_string(&Command::ColorChange).unwrap();
        assert_eq!(json, r#"{"type":"color_change"}"#);
    }
}
