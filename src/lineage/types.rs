//! Lineage, frame, node and image containers.

use super::model::CellModel;
use rand::Rng;

/// A single grayscale image slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    pixels: Vec<f32>,
}

impl Image {
    /// Creates a zero-filled image.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    /// Creates an image with every pixel set to `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width * height],
        }
    }

    /// Wraps a row-major pixel buffer.
    ///
    /// Returns `None` if the buffer length does not match the shape.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<f32>) -> Option<Self> {
        (pixels.len() == width * height).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.pixels[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.pixels[y * self.width + x] = value;
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [f32] {
        &mut self.pixels
    }
}

/// Borrowed view of one z-slice of a frame's stacks.
#[derive(Debug, Clone, Copy)]
pub struct SliceView<'a> {
    pub real: &'a Image,
    pub synth: &'a Image,
    pub cell_map: &'a Image,
    pub dist_map: &'a Image,
}

/// Synthetic output of rendering one z-slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendering {
    pub synth: Image,
    pub cell_map: Image,
    pub dist_map: Image,
}

impl Rendering {
    /// Pairs the rendering with the real image it should be scored against.
    pub fn view<'a>(&'a self, real: &'a Image) -> SliceView<'a> {
        SliceView {
            real,
            synth: &self.synth,
            cell_map: &self.cell_map,
            dist_map: &self.dist_map,
        }
    }
}

/// Per-frame image stacks, one entry per z-slice.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameStacks {
    pub real: Vec<Image>,
    pub synth: Vec<Image>,
    pub cell_map: Vec<Image>,
    pub dist_map: Vec<Image>,
}

impl FrameStacks {
    /// Builds stacks from real images, with blank derived images of the same shape.
    pub fn from_real(real: Vec<Image>) -> Self {
        let blank: Vec<Image> = real.iter().map(|img| Image::new(img.width, img.height)).collect();
        Self {
            synth: blank.clone(),
            cell_map: blank.clone(),
            dist_map: blank,
            real,
        }
    }

    /// Number of z-slices held.
    pub fn depth(&self) -> usize {
        self.real.len()
    }

    /// Whether all four stacks hold exactly `depth` images.
    pub fn has_depth(&self, depth: usize) -> bool {
        [&self.real, &self.synth, &self.cell_map, &self.dist_map]
            .iter()
            .all(|stack| stack.len() == depth)
    }

    pub fn slice(&self, z_index: usize) -> SliceView<'_> {
        SliceView {
            real: &self.real[z_index],
            synth: &self.synth[z_index],
            cell_map: &self.cell_map[z_index],
            dist_map: &self.dist_map[z_index],
        }
    }

    fn store(&mut self, z_index: usize, rendering: Rendering) {
        self.synth[z_index] = rendering.synth;
        self.cell_map[z_index] = rendering.cell_map;
        self.dist_map[z_index] = rendering.dist_map;
    }
}

/// Geometry of a rod-shaped cell.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    pub name: String,
    /// Center `[x, y, z]` in pixel units.
    pub position: [f64; 3],
    pub length: f64,
    pub width: f64,
    /// Orientation in radians.
    pub rotation: f64,
    /// Dormant cells are never edited.
    pub dormant: bool,
}

impl Cell {
    pub fn new(name: impl Into<String>, position: [f64; 3], length: f64, width: f64) -> Self {
        Self {
            name: name.into(),
            position,
            length,
            width,
            rotation: 0.0,
            dormant: false,
        }
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_dormant(mut self, dormant: bool) -> Self {
        self.dormant = dormant;
        self
    }
}

/// A tracked cell in one frame.
///
/// `parent` indexes the previous frame's nodes; `children` index the
/// next frame's nodes. `children` is derived from the next frame's
/// `parent` links by [`Lineage::relink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub cell: Cell,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl Node {
    pub fn new(cell: Cell, parent: Option<usize>) -> Self {
        Self {
            cell,
            parent,
            children: Vec::new(),
        }
    }
}

/// Frame-wide rendering corrections.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameParams {
    pub background_offset: f64,
    pub opacity_offset: f64,
    pub diffraction_offset: f64,
    pub camera_shift: [f64; 2],
}

/// One time step of the lineage.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub nodes: Vec<Node>,
    pub params: FrameParams,
    pub stacks: FrameStacks,
}

impl Frame {
    pub fn new(real: Vec<Image>) -> Self {
        Self {
            nodes: Vec::new(),
            params: FrameParams::default(),
            stacks: FrameStacks::from_real(real),
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<Node>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn cell_count(&self) -> usize {
        self.nodes.len()
    }

    /// Cells of this frame, in node order.
    pub fn cells(&self) -> Vec<Cell> {
        self.nodes.iter().map(|n| n.cell.clone()).collect()
    }

    /// Objective summed over every z-slice.
    pub fn cost<M: CellModel>(&self, model: &M) -> f64 {
        (0..self.stacks.depth())
            .map(|z| model.objective(self.stacks.slice(z)))
            .sum()
    }
}

/// Time series of frames under optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Lineage {
    frames: Vec<Frame>,
    z_slices: Vec<f64>,
}

impl Lineage {
    /// Creates a lineage and derives child links from parent links.
    pub fn new(frames: Vec<Frame>, z_slices: Vec<f64>) -> Self {
        let mut lineage = Self { frames, z_slices };
        for index in 1..lineage.frames.len() {
            lineage.relink(index);
        }
        lineage
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> &Frame {
        &self.frames[index]
    }

    pub fn frame_mut(&mut self, index: usize) -> &mut Frame {
        &mut self.frames[index]
    }

    /// Depths evaluated for every frame.
    pub fn z_slices(&self) -> &[f64] {
        &self.z_slices
    }

    pub fn frame_stacks(&self, index: usize) -> &FrameStacks {
        &self.frames[index].stacks
    }

    pub fn frame_stacks_mut(&mut self, index: usize) -> &mut FrameStacks {
        &mut self.frames[index].stacks
    }

    /// Shape of the first real image, if any.
    pub fn image_shape(&self) -> Option<(usize, usize)> {
        self.frames
            .first()
            .and_then(|f| f.stacks.real.first())
            .map(Image::shape)
    }

    /// Number of cells across frames `[start, end)`.
    pub fn count_cells_in(&self, start: usize, end: usize) -> usize {
        let end = end.min(self.frames.len());
        if start >= end {
            return 0;
        }
        self.frames[start..end].iter().map(Frame::cell_count).sum()
    }

    /// Uniformly draws a frame index in `[start, end)`.
    ///
    /// # Panics
    /// Panics if the range is empty.
    pub fn choose_random_frame_index<R: Rng>(&self, start: usize, end: usize, rng: &mut R) -> usize {
        rng.random_range(start..end)
    }

    /// Total objective over frames `[start, end)`.
    pub fn cost_in<M: CellModel>(&self, model: &M, start: usize, end: usize) -> f64 {
        let end = end.min(self.frames.len());
        self.frames[start.min(end)..end]
            .iter()
            .map(|f| f.cost(model))
            .sum()
    }

    /// Owned copy of frames `[start, end)`.
    ///
    /// Parent links of the first copied frame still refer to frame
    /// `start - 1` of the source lineage; they are kept as plain data
    /// and resolved again by [`splice`](Self::splice).
    pub fn detach(&self, start: usize, end: usize) -> Lineage {
        Lineage {
            frames: self.frames[start..end].to_vec(),
            z_slices: self.z_slices.clone(),
        }
    }

    /// Replaces frames `[start, start + detached.len())` with `detached`.
    pub fn splice(&mut self, start: usize, detached: Lineage) {
        let end = start + detached.frames.len();
        self.frames.splice(start..end, detached.frames);
        if start > 0 {
            self.relink(start);
        }
        if end < self.frames.len() {
            self.relink(end);
        }
    }

    /// Rebuilds the child lists of frame `index - 1` from the parent
    /// links of frame `index`. Parent links pointing past the previous
    /// frame are dropped.
    pub fn relink(&mut self, index: usize) {
        if index == 0 || index >= self.frames.len() {
            return;
        }
        let (before, after) = self.frames.split_at_mut(index);
        let prev = &mut before[index - 1].nodes;
        for node in prev.iter_mut() {
            node.children.clear();
        }
        for (i, node) in after[0].nodes.iter_mut().enumerate() {
            match node.parent {
                Some(p) if p < prev.len() => prev[p].children.push(i),
                Some(_) => node.parent = None,
                None => {}
            }
        }
    }

    /// Seeds frame `to` with copies of the cells of frame `to - 1`,
    /// each linked to the cell it was copied from.
    pub fn copy_cells_forward(&mut self, to: usize) {
        if to == 0 || to >= self.frames.len() {
            return;
        }
        let nodes = self.frames[to - 1]
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| Node::new(n.cell.clone(), Some(i)))
            .collect();
        self.frames[to].nodes = nodes;
        self.relink(to);
        if to + 1 < self.frames.len() {
            self.relink(to + 1);
        }
    }

    /// Re-renders the synthetic stacks of one frame from its cells.
    pub fn render_frame<M: CellModel>(&mut self, model: &M, index: usize) {
        let frame = &mut self.frames[index];
        let cells = frame.cells();
        for (z_index, &z) in self.z_slices.iter().enumerate() {
            let rendering = model.render(&cells, &frame.params, &frame.stacks.real[z_index], z);
            frame.stacks.store(z_index, rendering);
        }
    }

    /// Re-renders every frame.
    pub fn render_all<M: CellModel>(&mut self, model: &M) {
        for index in 0..self.frames.len() {
            self.render_frame(model, index);
        }
    }

    /// Replaces node `remove` of frame `index` by `heir`.
    ///
    /// Children of the removed node are handed to `heir` and all
    /// indices into the frame are shifted down past the removed slot.
    pub(crate) fn remove_node(&mut self, index: usize, remove: usize, heir: usize) {
        let heir = if heir > remove { heir - 1 } else { heir };
        self.frames[index].nodes.remove(remove);
        if let Some(next) = self.frames.get_mut(index + 1) {
            for node in &mut next.nodes {
                node.parent = node.parent.map(|p| match p.cmp(&remove) {
                    std::cmp::Ordering::Less => p,
                    std::cmp::Ordering::Equal => heir,
                    std::cmp::Ordering::Greater => p - 1,
                });
            }
        }
        self.relink(index);
        self.relink(index + 1);
    }
}
