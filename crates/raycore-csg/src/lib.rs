#![warn(missing_docs)]

//! Boolean solid composition for the raycore engine.
//!
//! A [`BooleanSolid`] combines two child primitives into a Union, Intersect
//! or Subtract solid. Rather than evaluating geometry, it lazily merges the
//! two children's ordered intersection-event streams: events are popped in
//! distance order, each updates the inside/outside state of its child, and
//! a surface crossing is reported to the caller exactly when the boolean
//! combination of the two states flips. Tangential events that do not flip
//! the combination are suppressed, so composed solids never report
//! duplicate or zero-length surfaces.

use std::iter::Peekable;

use raycore_math::Point3;
use raycore_primitives::{Intersection, IntersectionIter, Primitive};
use raycore_spatial::{Aabb3, Ray};

/// The boolean operation a [`BooleanSolid`] applies to its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperation {
    /// Points inside either child.
    Union,
    /// Points inside both children.
    Intersect,
    /// Points inside the first child but not the second.
    Subtract,
}

impl BooleanOperation {
    /// Evaluate the combination predicate for the two child states.
    #[inline]
    pub fn evaluate(self, inside_a: bool, inside_b: bool) -> bool {
        match self {
            Self::Union => inside_a || inside_b,
            Self::Intersect => inside_a && inside_b,
            Self::Subtract => inside_a && !inside_b,
        }
    }
}

/// A solid composed from two child primitives by a boolean operation.
///
/// Children are full [`Primitive`]s, so boolean solids nest arbitrarily.
#[derive(Debug)]
pub struct BooleanSolid {
    op: BooleanOperation,
    a: Box<dyn Primitive>,
    b: Box<dyn Primitive>,
}

impl BooleanSolid {
    /// Compose two primitives with an explicit operation.
    pub fn new(op: BooleanOperation, a: Box<dyn Primitive>, b: Box<dyn Primitive>) -> Self {
        Self { op, a, b }
    }

    /// Union of `a` and `b`.
    pub fn union(a: impl Primitive + 'static, b: impl Primitive + 'static) -> Self {
        Self::new(BooleanOperation::Union, Box::new(a), Box::new(b))
    }

    /// Intersection of `a` and `b`.
    pub fn intersect(a: impl Primitive + 'static, b: impl Primitive + 'static) -> Self {
        Self::new(BooleanOperation::Intersect, Box::new(a), Box::new(b))
    }

    /// Subtraction `a − b`.
    pub fn subtract(a: impl Primitive + 'static, b: impl Primitive + 'static) -> Self {
        Self::new(BooleanOperation::Subtract, Box::new(a), Box::new(b))
    }

    /// The operation this solid applies.
    pub fn operation(&self) -> BooleanOperation {
        self.op
    }
}

impl Primitive for BooleanSolid {
    /// Conservative bounds: the children's union box for Union, the first
    /// child's box for Intersect and Subtract. Leaf-level tests are
    /// authoritative, a looser box only costs candidate tests.
    fn bounding_box(&self) -> Aabb3 {
        match self.op {
            BooleanOperation::Union => self.a.bounding_box().union(&self.b.bounding_box()),
            BooleanOperation::Intersect | BooleanOperation::Subtract => self.a.bounding_box(),
        }
    }

    fn contains(&self, point: &Point3) -> bool {
        self.op
            .evaluate(self.a.contains(point), self.b.contains(point))
    }

    fn intersections<'a>(&'a self, ray: &'a Ray) -> IntersectionIter<'a> {
        Box::new(MergeEvents::new(
            self.op,
            self.a.intersections(ray),
            self.b.intersections(ray),
        ))
    }
}

/// Which child an event was popped from.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

/// Lazy ordered merge of two child event streams.
///
/// The inside/outside state of each child is seeded from its first pending
/// event: a stream whose first crossing is an exit began inside that child.
/// A child with no events at all is treated as never entered, which makes
/// an absent child degenerate correctly (`Union(A, ∅) = A`,
/// `Intersect(A, ∅) = ∅`, `Subtract(A, ∅) = A`).
struct MergeEvents<'a> {
    a: Peekable<IntersectionIter<'a>>,
    b: Peekable<IntersectionIter<'a>>,
    op: BooleanOperation,
    inside_a: bool,
    inside_b: bool,
    inside: bool,
    last_t: f64,
    halted: bool,
}

impl<'a> MergeEvents<'a> {
    fn new(op: BooleanOperation, a: IntersectionIter<'a>, b: IntersectionIter<'a>) -> Self {
        let mut a = a.peekable();
        let mut b = b.peekable();
        let inside_a = a.peek().is_some_and(|e| e.exiting);
        let inside_b = b.peek().is_some_and(|e| e.exiting);
        Self {
            a,
            b,
            op,
            inside_a,
            inside_b,
            inside: op.evaluate(inside_a, inside_b),
            last_t: 0.0,
            halted: false,
        }
    }

    fn pop_nearest(&mut self) -> Option<(Intersection, Side)> {
        let side = match (self.a.peek(), self.b.peek()) {
            (Some(ea), Some(eb)) => {
                if ea.t <= eb.t {
                    Side::A
                } else {
                    Side::B
                }
            }
            (Some(_), None) => Side::A,
            (None, Some(_)) => Side::B,
            (None, None) => return None,
        };
        let event = match side {
            Side::A => self.a.next(),
            Side::B => self.b.next(),
        }?;
        Some((event, side))
    }

    fn apply(&mut self, event: &Intersection, side: Side) {
        match side {
            Side::A => self.inside_a = !event.exiting,
            Side::B => self.inside_b = !event.exiting,
        }
    }
}

impl Iterator for MergeEvents<'_> {
    type Item = Intersection;

    fn next(&mut self) -> Option<Intersection> {
        if self.halted {
            return None;
        }
        loop {
            let (event, side) = self.pop_nearest()?;
            if event.t < self.last_t {
                // A child broke the ordered-stream contract; stop rather
                // than produce an inconsistent merge.
                log::error!(
                    "csg child stream out of order: event at t={} after t={}",
                    event.t,
                    self.last_t
                );
                self.halted = true;
                return None;
            }
            self.last_t = event.t;
            self.apply(&event, side);

            // Coincident events from both children form a single state
            // change; fold them in before evaluating the predicate.
            while self.a.peek().is_some_and(|e| e.t == event.t)
                || self.b.peek().is_some_and(|e| e.t == event.t)
            {
                if let Some((extra, extra_side)) = self.pop_nearest() {
                    self.apply(&extra, extra_side);
                } else {
                    break;
                }
            }

            let now_inside = self.op.evaluate(self.inside_a, self.inside_b);
            if now_inside == self.inside {
                continue;
            }
            self.inside = now_inside;

            let mut out = event;
            out.exiting = !now_inside;
            // A subtracted child's surface bounds the result from the
            // inside, so its outward normal flips.
            if side == Side::B && self.op == BooleanOperation::Subtract {
                out.normal = -out.normal;
            }
            return Some(out);
        }
    }
}
