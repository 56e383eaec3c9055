//! SAH k-d tree accelerator.
//!
//! The build sweeps Start/Planar/End events per axis and picks the split
//! plane with the lowest surface-area-heuristic cost. Geometries straddling
//! the plane are duplicated into both subtrees by reference (scene index).
//! Traversal is the stackful recursive variant TA_rec_B (Havran, "Heuristic
//! Ray Shooting Algorithms", appendix C): it visits leaves in strictly
//! increasing ray-parameter order, so the first accepted triangle hit is
//! the nearest one and traversal stops there.

use std::collections::BTreeMap;

use tracing::debug;

use crate::Point;
use crate::geom::Axis;
use crate::geom::bboxes::BoundingBox;
use crate::geom::ray::Ray;
use crate::sim::accel::{Accelerator, Hit, RayQuery, RxCrossing};
use crate::sim::scene::{SceneGeometry, scene_bounds};

/// Nodes deeper than this are never split.
const MAX_DEPTH: u32 = 18;
/// Lists of this size or smaller become leaves.
const LEAF_SIZE: usize = 8;
/// SAH traversal constant (KT).
const TRAVERSAL_COST: f64 = 1.0;
/// SAH intersection constant (KI).
const INTERSECT_COST: f64 = 1.5;
/// Splits costlier than this multiple of the list size are rejected.
const NO_SPLIT_FACTOR: f64 = 1.5;
/// Guard band around the leaf interval for accepting hits, covering
/// triangles that straddle leaf boundaries.
const DISTANCE_GUARD: f64 = 1e-3;
/// Depth is capped at 18 and at most 2 entries are consumed per level.
const STACK_SIZE: usize = 50;

pub struct KdTree {
    root: KdNode,
    stats: KdTreeStats,
}

struct KdNode {
    bbox: BoundingBox,
    kind: KdNodeKind,
}

enum KdNodeKind {
    Internal {
        axis: Axis,
        split: f64,
        left: Box<KdNode>,
        right: Box<KdNode>,
    },
    Leaf {
        items: Vec<usize>,
    },
}

/// Construction statistics, recorded while building.
#[derive(Debug, Clone, Copy, Default)]
pub struct KdTreeStats {
    pub leaves: usize,
    /// Total leaf membership; larger than the scene size when geometries
    /// were duplicated across subtrees.
    pub leaf_members: usize,
    pub max_depth: u32,
    pub max_leaf_size: usize,
    /// Leaves created because no split beat the no-split cost floor.
    pub sah_terminated: usize,
}

/// Event kinds in sweep order: End < Planar < Start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    End,
    Planar,
    Start,
}

#[derive(Debug, Clone, Copy)]
struct KdEvent {
    position: f64,
    kind: EventKind,
}

#[derive(Debug, Clone, Copy)]
struct SplitPlane {
    axis: Axis,
    position: f64,
    cost: f64,
}

impl KdTree {
    /// Builds the tree over the whole scene.
    pub fn build(scene: &[SceneGeometry]) -> Self {
        let origin = Point::new(0., 0., 0.);
        let bbox = scene_bounds(scene).unwrap_or(BoundingBox::new(origin, origin));
        let items: Vec<usize> = (0..scene.len()).collect();

        let mut stats = KdTreeStats::default();
        let root = build_node(scene, items, bbox, 0, &mut stats);
        debug!(
            leaves = stats.leaves,
            leaf_members = stats.leaf_members,
            max_depth = stats.max_depth,
            "k-d tree built"
        );
        Self { root, stats }
    }

    pub fn stats(&self) -> KdTreeStats {
        self.stats
    }
}

fn make_leaf(
    items: Vec<usize>,
    bbox: BoundingBox,
    depth: u32,
    stats: &mut KdTreeStats,
    sah_forced: bool,
) -> KdNode {
    stats.leaves += 1;
    stats.leaf_members += items.len();
    stats.max_depth = stats.max_depth.max(depth);
    stats.max_leaf_size = stats.max_leaf_size.max(items.len());
    if sah_forced {
        stats.sah_terminated += 1;
    }
    KdNode {
        bbox,
        kind: KdNodeKind::Leaf { items },
    }
}

fn build_node(
    scene: &[SceneGeometry],
    items: Vec<usize>,
    bbox: BoundingBox,
    depth: u32,
    stats: &mut KdTreeStats,
) -> KdNode {
    if items.len() <= LEAF_SIZE || depth > MAX_DEPTH {
        return make_leaf(items, bbox, depth, stats, false);
    }

    // No evaluated candidate at all also means "do not split"
    let Some(plane) = best_split(scene, &items, &bbox) else {
        return make_leaf(items, bbox, depth, stats, false);
    };
    if plane.cost > NO_SPLIT_FACTOR * items.len() as f64 {
        return make_leaf(items, bbox, depth, stats, true);
    }

    let axis = plane.axis;
    let split = plane.position;

    // Clipping rule: straddlers are duplicated into both subtrees.
    // On-plane geometries go right.
    let mut left_items = Vec::new();
    let mut right_items = Vec::new();
    for &index in &items {
        match &scene[index] {
            SceneGeometry::Triangle(t) => {
                if t.a.axis(axis) < split || t.b.axis(axis) < split || t.c.axis(axis) < split {
                    left_items.push(index);
                }
                if t.a.axis(axis) >= split || t.b.axis(axis) >= split || t.c.axis(axis) >= split {
                    right_items.push(index);
                }
            }
            SceneGeometry::Receiver(s) => {
                let center = s.center.axis(axis);
                if center - s.radius < split {
                    left_items.push(index);
                }
                if center + s.radius >= split {
                    right_items.push(index);
                }
            }
        }
    }

    let left = build_node(
        scene,
        left_items,
        bbox.clipped_below(axis, split),
        depth + 1,
        stats,
    );
    let right = build_node(
        scene,
        right_items,
        bbox.clipped_above(axis, split),
        depth + 1,
        stats,
    );
    KdNode {
        bbox,
        kind: KdNodeKind::Internal {
            axis,
            split,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

/// Sweeps all candidate split planes on all axes and returns the cheapest.
///
/// The sweep keeps running counts of geometries strictly left (NL), planar
/// at the candidate plane (NP) and strictly right (NR). Planar geometries
/// are counted with the left side in the cost, while distribution sends
/// them right; the asymmetry is intentional.
fn best_split(scene: &[SceneGeometry], items: &[usize], bbox: &BoundingBox) -> Option<SplitPlane> {
    let mut best: Option<SplitPlane> = None;

    for axis in Axis::ALL {
        let mut events: Vec<KdEvent> = Vec::with_capacity(items.len() * 2);
        for &index in items {
            let b = scene[index].bounding_box();
            let lo = b.min.axis(axis);
            let hi = b.max.axis(axis);
            if lo == hi {
                events.push(KdEvent {
                    position: lo,
                    kind: EventKind::Planar,
                });
            } else {
                events.push(KdEvent {
                    position: lo,
                    kind: EventKind::Start,
                });
                events.push(KdEvent {
                    position: hi,
                    kind: EventKind::End,
                });
            }
        }
        events.sort_by(|a, b| a.position.total_cmp(&b.position).then(a.kind.cmp(&b.kind)));

        let height = bbox.extent(axis.next());
        let depth = bbox.extent(axis.prev());
        let width = bbox.extent(axis);
        let sa = width * height + width * depth + height * depth;
        if sa <= 0.0 {
            continue; // box degenerate on this axis pair
        }

        let mut nl = 0usize;
        let mut nr = items.len();

        let mut i = 0usize;
        while i < events.len() {
            let position = events[i].position;
            let mut ends = 0usize;
            let mut planars = 0usize;
            let mut starts = 0usize;
            while i < events.len()
                && events[i].position == position
                && events[i].kind == EventKind::End
            {
                ends += 1;
                i += 1;
            }
            while i < events.len()
                && events[i].position == position
                && events[i].kind == EventKind::Planar
            {
                planars += 1;
                i += 1;
            }
            while i < events.len()
                && events[i].position == position
                && events[i].kind == EventKind::Start
            {
                starts += 1;
                i += 1;
            }

            // Move the plane onto this position: NP holds the on-plane
            // geometries and NR excludes them
            let np = planars;
            nr -= planars + ends;

            let left_width = position - bbox.min.axis(axis);
            let right_width = bbox.max.axis(axis) - position;
            let sal = left_width * height + left_width * depth + height * depth;
            let sar = right_width * height + right_width * depth + height * depth;
            let cost = TRAVERSAL_COST
                + INTERSECT_COST * ((sal / sa) * (nl + np) as f64 + (sar / sa) * nr as f64);

            if best.map_or(true, |b| cost < b.cost) {
                best = Some(SplitPlane {
                    axis,
                    position,
                    cost,
                });
            }

            nl += starts + np;
        }
    }

    best
}

impl Accelerator for KdTree {
    fn intersect(&self, scene: &[SceneGeometry], ray: &Ray) -> RayQuery {
        #[derive(Clone, Copy)]
        struct StackEntry<'t> {
            /// Signed distance along the ray.
            t: f64,
            /// Point on the ray at that distance.
            pb: Point,
            /// Far child still to be visited; None terminates traversal.
            node: Option<&'t KdNode>,
            /// Index of the previous stack entry.
            prev: usize,
        }

        let Some((a, b)) = self.root.bbox.ray_span(ray.origin, ray.direction) else {
            return RayQuery::default();
        };

        let empty = StackEntry {
            t: 0.0,
            pb: Point::new(0., 0., 0.),
            node: None,
            prev: 0,
        };
        let mut stack = [empty; STACK_SIZE];

        let mut en_pt = 0usize;
        stack[en_pt].t = a;
        // Distinguish external from internal ray origins
        stack[en_pt].pb = if a >= 0.0 { ray.point_at(a) } else { ray.origin };

        let mut ex_pt = 1usize;
        stack[ex_pt].t = b;
        stack[ex_pt].pb = ray.point_at(b);
        stack[ex_pt].node = None;

        // Nearest crossing per receiver collected across all visited leaves
        let mut crossings: BTreeMap<usize, RxCrossing> = BTreeMap::new();

        let mut current = Some(&self.root);
        while let Some(top) = current {
            let mut node = top;

            // Descend to the leaf covering the current interval
            loop {
                let (axis, split, left, right) = match &node.kind {
                    KdNodeKind::Internal {
                        axis,
                        split,
                        left,
                        right,
                    } => (*axis, *split, left.as_ref(), right.as_ref()),
                    KdNodeKind::Leaf { .. } => break,
                };

                let far_child;
                if stack[en_pt].pb.axis(axis) <= split {
                    if stack[ex_pt].pb.axis(axis) <= split {
                        node = left;
                        continue;
                    }
                    far_child = right;
                    node = left;
                } else {
                    if stack[ex_pt].pb.axis(axis) > split {
                        node = right;
                        continue;
                    }
                    far_child = left;
                    node = right;
                }

                // Both children intersect the ray; push the far one
                let t = (split - ray.origin.axis(axis)) / ray.direction.axis(axis);

                let prev = ex_pt;
                ex_pt += 1;
                if ex_pt == en_pt {
                    ex_pt += 1;
                }

                let next_axis = axis.next();
                let prev_axis = axis.prev();
                let mut pb = Point::new(0., 0., 0.);
                pb.set_axis(axis, split);
                pb.set_axis(
                    next_axis,
                    ray.origin.axis(next_axis) + t * ray.direction.axis(next_axis),
                );
                pb.set_axis(
                    prev_axis,
                    ray.origin.axis(prev_axis) + t * ray.direction.axis(prev_axis),
                );

                stack[ex_pt].prev = prev;
                stack[ex_pt].t = t;
                stack[ex_pt].node = Some(far_child);
                stack[ex_pt].pb = pb;
            }

            let KdNodeKind::Leaf { items } = &node.kind else {
                unreachable!()
            };

            let lo = stack[en_pt].t - DISTANCE_GUARD;
            let hi = stack[ex_pt].t + DISTANCE_GUARD;
            let mut best: Option<Hit> = None;

            for &index in items {
                match &scene[index] {
                    SceneGeometry::Triangle(triangle) => {
                        if let Some((distance, position)) =
                            triangle.intersect(ray.origin, ray.direction)
                        {
                            if distance >= lo
                                && distance <= hi
                                && best.map_or(true, |h| distance < h.distance)
                            {
                                best = Some(Hit {
                                    distance,
                                    position,
                                    normal: triangle.normal,
                                    geometry: index,
                                });
                            }
                        }
                    }
                    SceneGeometry::Receiver(sphere) => {
                        if let Some((distance, _)) = sphere.intersect(ray.origin, ray.direction) {
                            if distance >= lo && distance <= hi {
                                let crossing = RxCrossing {
                                    receiver: sphere.receiver,
                                    distance,
                                    offset: sphere.closest_approach(ray.origin, ray.direction),
                                    radius: sphere.radius,
                                };
                                crossings
                                    .entry(sphere.receiver)
                                    .and_modify(|c| {
                                        if crossing.distance < c.distance {
                                            *c = crossing;
                                        }
                                    })
                                    .or_insert(crossing);
                            }
                        }
                    }
                }
            }

            // Ordered traversal: the first accepted triangle is the nearest
            if let Some(hit) = best {
                let receivers = crossings
                    .into_values()
                    .filter(|c| c.distance < hit.distance)
                    .collect();
                return RayQuery {
                    occluder: Some(hit),
                    receivers,
                };
            }

            // Pop: the signed distance intervals are adjacent
            en_pt = ex_pt;
            current = stack[ex_pt].node;
            ex_pt = stack[en_pt].prev;
        }

        // Ray left the scene without hitting an occluder
        RayQuery {
            occluder: None,
            receivers: crossings.into_values().collect(),
        }
    }
}
