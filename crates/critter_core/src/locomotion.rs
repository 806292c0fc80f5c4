//! Movement with collision against static obstacles.
//!
//! A step is `direction.normalize() * speed * dt`. The full step is tried
//! first; if the moved body would overlap a barrier, the X component alone
//! is tried, then the Y component alone, and if all three are blocked the
//! agent stays put. Every candidate is clamped into the movement area
//! before it is checked, so the pen edge can never push a body into a
//! wall. A barrier the body already overlaps when the step starts is
//! ignored for that step so agents can walk off a marker that was dropped
//! on top of them.
//!
//! Everything here is a free function over plain values; the simulation
//! owns the entities and applies the results.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::entities::{Axis, StuckTracker};
use crate::math::{percent, Aabb, Fixed, Vec2Fixed};
use crate::rng::RandomSource;

/// Which variant of a step was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Nothing requested (zero direction or zero distance).
    Idle,
    /// The full step.
    Full,
    /// Only the X component.
    SlideX,
    /// Only the Y component.
    SlideY,
    /// Every variant was blocked.
    Blocked,
}

/// Result of [`try_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Body center after the step.
    pub position: Vec2Fixed,
    /// Which variant was taken.
    pub kind: StepKind,
    /// Inward normal of the area edges the full step ran into; zero when
    /// it stayed inside.
    pub edge: Vec2Fixed,
}

impl MoveOutcome {
    /// True if the body moved.
    #[must_use]
    pub fn moved(&self) -> bool {
        matches!(self.kind, StepKind::Full | StepKind::SlideX | StepKind::SlideY)
    }
}

fn blocked(body: Aabb, barriers: &[Aabb], ignore: &[bool]) -> bool {
    barriers
        .iter()
        .zip(ignore)
        .any(|(barrier, skip)| !*skip && body.intersects(barrier))
}

/// Move `body` by `distance` along `direction`, sliding along obstacles and
/// staying inside `area` (the box body centers may occupy).
///
/// The resulting body never overlaps a barrier it did not already overlap.
#[must_use]
pub fn try_move(
    body: Aabb,
    direction: Vec2Fixed,
    distance: Fixed,
    barriers: &[Aabb],
    area: &Aabb,
) -> MoveOutcome {
    let idle = MoveOutcome {
        position: body.center,
        kind: StepKind::Idle,
        edge: Vec2Fixed::ZERO,
    };
    if distance <= Fixed::ZERO {
        return idle;
    }
    let Some(unit) = direction.try_normalize() else {
        return idle;
    };

    let step = unit.scale(distance);
    let (_, edge) = clamp_point(body.center + step, area);
    let ignore: Vec<bool> = barriers.iter().map(|b| body.intersects(b)).collect();

    let candidates = [
        (step, StepKind::Full),
        (Vec2Fixed::new(step.x, Fixed::ZERO), StepKind::SlideX),
        (Vec2Fixed::new(Fixed::ZERO, step.y), StepKind::SlideY),
    ];
    for (delta, kind) in candidates {
        if delta.is_zero() {
            continue;
        }
        let (target, _) = clamp_point(body.center + delta, area);
        if target == body.center {
            continue;
        }
        let moved = body.at(target);
        if !blocked(moved, barriers, &ignore) {
            return MoveOutcome {
                position: target,
                kind,
                edge,
            };
        }
    }

    MoveOutcome {
        position: body.center,
        kind: StepKind::Blocked,
        edge,
    }
}

/// Distance from a point to the nearest point of a box (zero inside).
#[must_use]
pub fn distance_to_box(point: Vec2Fixed, bounds: &Aabb) -> Fixed {
    let (min, max) = (bounds.min(), bounds.max());
    let closest = Vec2Fixed::new(point.x.clamp(min.x, max.x), point.y.clamp(min.y, max.y));
    point.distance(closest)
}

/// Speed multiplier near obstacles.
///
/// Scales linearly from `damping_floor` at contact up to 1 at
/// `damping_radius` from the nearest barrier.
#[must_use]
pub fn damping_factor(position: Vec2Fixed, barriers: &[Aabb], config: &SimConfig) -> Fixed {
    let one = Fixed::from_num(1);
    if config.damping_radius <= Fixed::ZERO {
        return one;
    }
    let nearest = barriers
        .iter()
        .map(|b| distance_to_box(position, b))
        .min();
    match nearest {
        Some(d) if d < config.damping_radius => {
            config.damping_floor + (one - config.damping_floor) * (d / config.damping_radius)
        }
        _ => one,
    }
}

/// Unit direction pushing away from neighbours inside `personal_space`.
///
/// Neighbours sitting exactly on `position` contribute nothing. Returns zero
/// when nobody is too close.
#[must_use]
pub fn separation_direction(
    position: Vec2Fixed,
    neighbours: impl IntoIterator<Item = Vec2Fixed>,
    config: &SimConfig,
) -> Vec2Fixed {
    let limit = config.personal_space * config.personal_space;
    let push = neighbours
        .into_iter()
        .filter(|other| position.distance_squared(*other) < limit)
        .filter_map(|other| (position - other).try_normalize())
        .fold(Vec2Fixed::ZERO, |acc, away| acc + away);
    push.normalize()
}

/// Feed one update into the stuck detector.
///
/// Time accumulates while the agent asks to move but stays within
/// `stuck_epsilon` of the window's anchor. Once it passes `stuck_timeout`
/// the window resets and a perpendicular nudge direction is returned.
pub fn track_stuck(
    tracker: &mut StuckTracker,
    position: Vec2Fixed,
    requested: Vec2Fixed,
    dt: Fixed,
    config: &SimConfig,
) -> Option<Vec2Fixed> {
    if requested.is_zero() {
        tracker.anchor = position;
        tracker.time = Fixed::ZERO;
        return None;
    }
    tracker.last_direction = requested;

    let epsilon = config.stuck_epsilon;
    if position.distance_squared(tracker.anchor) > epsilon * epsilon {
        tracker.anchor = position;
        tracker.time = Fixed::ZERO;
        return None;
    }

    tracker.time += dt;
    if tracker.time <= config.stuck_timeout {
        return None;
    }

    tracker.anchor = position;
    tracker.time = Fixed::ZERO;
    requested.normalize().perpendicular().try_normalize()
}

/// Clamp a point into `area`.
///
/// Also returns the inward normal of every edge the point was held back by
/// (`+1` on a min edge, `-1` on a max edge, `0` otherwise).
#[must_use]
pub fn clamp_point(point: Vec2Fixed, area: &Aabb) -> (Vec2Fixed, Vec2Fixed) {
    let (min, max) = (area.min(), area.max());
    let one = Fixed::from_num(1);
    let axis = |v: Fixed, lo: Fixed, hi: Fixed| {
        if v < lo {
            (lo, one)
        } else if v > hi {
            (hi, -one)
        } else {
            (v, Fixed::ZERO)
        }
    };
    let (x, nx) = axis(point.x, min.x, max.x);
    let (y, ny) = axis(point.y, min.y, max.y);
    (Vec2Fixed::new(x, y), Vec2Fixed::new(nx, ny))
}

/// Reflect heading components that point out through an edge with inward
/// normal `edge`.
#[must_use]
pub fn bounce(heading: Vec2Fixed, edge: Vec2Fixed) -> Vec2Fixed {
    let reflect = |h: Fixed, n: Fixed| if n == Fixed::ZERO { h } else { h.abs() * n };
    Vec2Fixed::new(reflect(heading.x, edge.x), reflect(heading.y, edge.y))
}

/// Pull a body that ended up outside `area` back in, unless that would push
/// it into a barrier it does not already overlap.
#[must_use]
pub fn settle_in_area(body: Aabb, barriers: &[Aabb], area: &Aabb) -> Vec2Fixed {
    let (target, _) = clamp_point(body.center, area);
    if target == body.center {
        return target;
    }
    let ignore: Vec<bool> = barriers.iter().map(|b| body.intersects(b)).collect();
    if blocked(body.at(target), barriers, &ignore) {
        body.center
    } else {
        target
    }
}

/// Next zig-zag waypoint: halfway toward a randomly chosen border along `axis`.
pub fn explore_waypoint(
    position: Vec2Fixed,
    axis: Axis,
    config: &SimConfig,
    rng: &mut impl RandomSource,
) -> Vec2Fixed {
    let (min, max) = (config.bounds_min(), config.bounds_max());
    let toward_min = rng.chance(percent(50));
    let half = percent(50);
    match axis {
        Axis::X => {
            let border = if toward_min { min.x } else { max.x };
            Vec2Fixed::new(position.x + (border - position.x) * half, position.y)
        }
        Axis::Y => {
            let border = if toward_min { min.y } else { max.y };
            Vec2Fixed::new(position.x, position.y + (border - position.y) * half)
        }
    }
}

/// True if `position` is within `epsilon` of `target`.
#[must_use]
pub fn arrived(position: Vec2Fixed, target: Vec2Fixed, epsilon: Fixed) -> bool {
    position.distance_squared(target) <= epsilon * epsilon
}

/// Random unit direction; zero only if both rolls land on zero.
pub fn random_direction(rng: &mut impl RandomSource) -> Vec2Fixed {
    let one = Fixed::from_num(1);
    Vec2Fixed::new(rng.uniform(-one, one), rng.uniform(-one, one)).normalize()
}
