// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Region quadtree over bounding rectangles.
//!
//! Items are stored at the deepest node whose bounds fully contain their
//! rectangle; a leaf splits into four quadrants once it holds more than
//! `capacity` items. Point queries only visit the nodes along the path to
//! the point.

use geo::{Coord, Rect};

/// Quadtree of `(Rect, T)` items.
#[derive(Debug, Clone)]
pub struct Quadtree<T> {
    root: QuadtreeNode<T>,
    capacity: usize,
    max_depth: u32,
    len: usize,
}

#[derive(Debug, Clone)]
struct QuadtreeNode<T> {
    bounds: Rect<f64>,
    depth: u32,
    items: Vec<(Rect<f64>, T)>,
    /// NW, NE, SW, SE once subdivided
    children: Option<Box<[QuadtreeNode<T>; 4]>>,
}

impl<T> Quadtree<T> {
    /// Create an empty tree covering `bounds`.
    pub fn new(bounds: Rect<f64>, capacity: usize, max_depth: u32) -> Self {
        Self {
            root: QuadtreeNode::new(bounds, 0),
            capacity: capacity.max(1),
            max_depth,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert an item keyed by its bounding rectangle.
    ///
    /// Rectangles reaching outside the tree's bounds are kept at the root so
    /// they are still found by queries.
    pub fn insert(&mut self, rect: Rect<f64>, item: T) {
        self.root.insert(rect, item, self.capacity, self.max_depth);
        self.len += 1;
    }

    /// Items whose rectangle contains `point`.
    pub fn query_point(&self, point: Coord<f64>) -> Vec<&T> {
        let mut results = Vec::new();
        self.root.query_point(point, &mut results);
        results
    }

    /// Depth of the deepest node (0 for an unsplit tree).
    pub fn depth(&self) -> u32 {
        self.root.max_depth()
    }
}

impl<T> QuadtreeNode<T> {
    fn new(bounds: Rect<f64>, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, rect: Rect<f64>, item: T, capacity: usize, max_depth: u32) {
        if let Some(children) = &mut self.children {
            if let Some(child) = children.iter_mut().find(|c| rect_within(&rect, &c.bounds)) {
                child.insert(rect, item, capacity, max_depth);
                return;
            }
            // Straddles a split line: stays here.
            self.items.push((rect, item));
            return;
        }

        self.items.push((rect, item));
        if self.items.len() > capacity && self.depth < max_depth {
            self.subdivide(capacity, max_depth);
        }
    }

    fn subdivide(&mut self, capacity: usize, max_depth: u32) {
        let min = self.bounds.min();
        let max = self.bounds.max();
        let mid_x = (min.x + max.x) / 2.0;
        let mid_y = (min.y + max.y) / 2.0;
        let depth = self.depth + 1;

        let quadrant = |x0: f64, y0: f64, x1: f64, y1: f64| {
            QuadtreeNode::new(Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 }), depth)
        };

        self.children = Some(Box::new([
            quadrant(min.x, mid_y, mid_x, max.y),
            quadrant(mid_x, mid_y, max.x, max.y),
            quadrant(min.x, min.y, mid_x, mid_y),
            quadrant(mid_x, min.y, max.x, mid_y),
        ]));

        for (rect, item) in std::mem::take(&mut self.items) {
            self.insert(rect, item, capacity, max_depth);
        }
    }

    fn query_point<'a>(&'a self, point: Coord<f64>, results: &mut Vec<&'a T>) {
        for (rect, item) in &self.items {
            if rect_contains(rect, point) {
                results.push(item);
            }
        }

        if let Some(children) = &self.children {
            for child in children.iter() {
                // A point on a split line belongs to every quadrant it touches.
                if rect_contains(&child.bounds, point) {
                    child.query_point(point, results);
                }
            }
        }
    }

    fn max_depth(&self) -> u32 {
        match &self.children {
            Some(children) => children
                .iter()
                .map(|c| c.max_depth())
                .max()
                .unwrap_or(self.depth),
            None => self.depth,
        }
    }
}

/// Whether `inner` lies entirely inside `outer`.
fn rect_within(inner: &Rect<f64>, outer: &Rect<f64>) -> bool {
    inner.min().x >= outer.min().x
        && inner.min().y >= outer.min().y
        && inner.max().x <= outer.max().x
        && inner.max().y <= outer.max().y
}

/// Inclusive point-in-rectangle test.
fn rect_contains(rect: &Rect<f64>, point: Coord<f64>) -> bool {
    point.x >= rect.min().x
        && point.x <= rect.max().x
        && point.y >= rect.min().y
        && point.y <= rect.max().y
}
