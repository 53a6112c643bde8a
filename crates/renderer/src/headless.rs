//! Counting graphics backend for checks and tests without a GPU.
//!
//! `HeadlessGraphics` tracks every object it hands out so callers can assert
//! that creates and deletes balance, that nothing is drawn before a link, and
//! that no call touches a handle after it was deleted. Compilation is a
//! structural check only; use [`crate::compile::validate_glsl`] for real GLSL
//! diagnostics.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::backend::{
    BufferHandle, GraphicsApi, HostSurface, ProgramHandle, ProgramLayout, ShaderHandle,
    TextureHandle, VertexArrayHandle, VertexAttribute,
};
use crate::error::FrameError;
use crate::types::{ClientRect, PhysicalSize, ShaderStage, TextureImage, Viewport};
use crate::uniforms::UniformSet;

/// Snapshot of everything a [`HeadlessGraphics`] instance observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessStats {
    pub contexts_acquired: usize,
    pub contexts_released: usize,
    pub shaders_created: usize,
    pub shaders_deleted: usize,
    pub programs_created: usize,
    pub programs_deleted: usize,
    pub buffers_created: usize,
    pub buffers_deleted: usize,
    pub vertex_arrays_created: usize,
    pub vertex_arrays_deleted: usize,
    pub textures_created: usize,
    pub textures_deleted: usize,
    pub viewport_updates: usize,
    pub viewport: Option<PhysicalSize>,
    pub clears: usize,
    pub clear_color: Option<[f32; 4]>,
    pub draw_calls: usize,
    pub reconfigures: usize,
    /// Uniform values in effect for each issued draw call.
    pub drawn_uniforms: Vec<UniformSet>,
    /// Calls that referenced an unknown or already deleted handle.
    pub invalid_calls: usize,
    /// Every API call in order, by name.
    pub calls: Vec<&'static str>,
}

impl HeadlessStats {
    /// Objects created and not yet deleted, contexts included.
    pub fn live_objects(&self) -> usize {
        let created = self.contexts_acquired
            + self.shaders_created
            + self.programs_created
            + self.buffers_created
            + self.vertex_arrays_created
            + self.textures_created;
        let deleted = self.contexts_released
            + self.shaders_deleted
            + self.programs_deleted
            + self.buffers_deleted
            + self.vertex_arrays_deleted
            + self.textures_deleted;
        created.saturating_sub(deleted)
    }

    pub fn last_uniforms(&self) -> Option<&UniformSet> {
        self.drawn_uniforms.last()
    }
}

type SharedStats = Rc<RefCell<HeadlessStats>>;

/// Graphics backend that records calls instead of rendering.
pub struct HeadlessGraphics {
    stats: SharedStats,
    frame_errors: Rc<RefCell<VecDeque<FrameError>>>,
    fail_link: bool,
    next_id: u64,
    shaders: HashMap<ShaderHandle, bool>,
    programs: HashSet<ProgramHandle>,
    linked: HashSet<ProgramHandle>,
    buffers: HashSet<BufferHandle>,
    vertex_arrays: HashSet<VertexArrayHandle>,
    textures: HashSet<TextureHandle>,
    pending_uniforms: Option<UniformSet>,
    released: bool,
}

impl HeadlessGraphics {
    fn new(
        stats: SharedStats,
        frame_errors: Rc<RefCell<VecDeque<FrameError>>>,
        fail_link: bool,
    ) -> Self {
        stats.borrow_mut().contexts_acquired += 1;
        Self {
            stats,
            frame_errors,
            fail_link,
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashSet::new(),
            linked: HashSet::new(),
            buffers: HashSet::new(),
            vertex_arrays: HashSet::new(),
            textures: HashSet::new(),
            pending_uniforms: None,
            released: false,
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&self, call: &'static str) {
        let mut stats = self.stats.borrow_mut();
        stats.calls.push(call);
        if self.released {
            stats.invalid_calls += 1;
        }
    }

    fn invalid(&self) {
        self.stats.borrow_mut().invalid_calls += 1;
    }
}

/// Structural stand-in for a compiler: delimiters must balance and an entry
/// point must exist.
fn structural_check(source: &str) -> Result<(), String> {
    let mut stack = Vec::new();
    for (line_index, line) in source.lines().enumerate() {
        let code = line.split("//").next().unwrap_or_default();
        for ch in code.chars() {
            match ch {
                '(' | '{' | '[' => stack.push((ch, line_index + 1)),
                ')' | '}' | ']' => {
                    let expected = match ch {
                        ')' => '(',
                        '}' => '{',
                        _ => '[',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => return Err(format!("ERROR: 0:{}: unexpected '{ch}'", line_index + 1)),
                    }
                }
                _ => {}
            }
        }
    }
    if let Some((open, line)) = stack.pop() {
        return Err(format!("ERROR: 0:{line}: unclosed '{open}'"));
    }
    if !source.contains("main") {
        return Err("ERROR: missing entry point 'main'".to_string());
    }
    Ok(())
}

impl GraphicsApi for HeadlessGraphics {
    fn create_shader(&mut self, _stage: ShaderStage) -> ShaderHandle {
        self.record("create_shader");
        let handle = ShaderHandle(self.next());
        self.shaders.insert(handle, false);
        self.stats.borrow_mut().shaders_created += 1;
        handle
    }

    fn compile_shader(&mut self, shader: ShaderHandle, source: &str) -> Result<(), String> {
        self.record("compile_shader");
        let Some(compiled) = self.shaders.get_mut(&shader) else {
            self.invalid();
            return Err("unknown shader object".to_string());
        };
        structural_check(source)?;
        *compiled = true;
        Ok(())
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.record("delete_shader");
        if self.shaders.remove(&shader).is_some() {
            self.stats.borrow_mut().shaders_deleted += 1;
        } else {
            self.invalid();
        }
    }

    fn create_program(&mut self) -> ProgramHandle {
        self.record("create_program");
        let handle = ProgramHandle(self.next());
        self.programs.insert(handle);
        self.stats.borrow_mut().programs_created += 1;
        handle
    }

    fn link_program(
        &mut self,
        program: ProgramHandle,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
        _layout: &ProgramLayout,
    ) -> Result<(), String> {
        self.record("link_program");
        if !self.programs.contains(&program) {
            self.invalid();
            return Err("unknown program object".to_string());
        }
        let compiled = |handle: &ShaderHandle| self.shaders.get(handle).copied().unwrap_or(false);
        if !compiled(&vertex) || !compiled(&fragment) {
            return Err("attached shaders are not compiled".to_string());
        }
        if self.fail_link {
            return Err("error: vertex output does not match fragment input".to_string());
        }
        self.linked.insert(program);
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.record("delete_program");
        if self.programs.remove(&program) {
            self.linked.remove(&program);
            self.stats.borrow_mut().programs_deleted += 1;
        } else {
            self.invalid();
        }
    }

    fn create_buffer(&mut self, _data: &[f32]) -> BufferHandle {
        self.record("create_buffer");
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle);
        self.stats.borrow_mut().buffers_created += 1;
        handle
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.record("delete_buffer");
        if self.buffers.remove(&buffer) {
            self.stats.borrow_mut().buffers_deleted += 1;
        } else {
            self.invalid();
        }
    }

    fn create_vertex_array(
        &mut self,
        program: ProgramHandle,
        buffer: BufferHandle,
        _attribute: VertexAttribute,
    ) -> VertexArrayHandle {
        self.record("create_vertex_array");
        if !self.linked.contains(&program) || !self.buffers.contains(&buffer) {
            self.invalid();
        }
        let handle = VertexArrayHandle(self.next());
        self.vertex_arrays.insert(handle);
        self.stats.borrow_mut().vertex_arrays_created += 1;
        handle
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.record("delete_vertex_array");
        if self.vertex_arrays.remove(&vertex_array) {
            self.stats.borrow_mut().vertex_arrays_deleted += 1;
        } else {
            self.invalid();
        }
    }

    fn create_texture(&mut self, image: &TextureImage) -> TextureHandle {
        self.record("create_texture");
        if !image.is_consistent() {
            self.invalid();
        }
        let handle = TextureHandle(self.next());
        self.textures.insert(handle);
        self.stats.borrow_mut().textures_created += 1;
        handle
    }

    fn bind_texture(&mut self, program: ProgramHandle, _unit: u32, texture: TextureHandle) {
        self.record("bind_texture");
        if !self.linked.contains(&program) || !self.textures.contains(&texture) {
            self.invalid();
        }
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.record("delete_texture");
        if self.textures.remove(&texture) {
            self.stats.borrow_mut().textures_deleted += 1;
        } else {
            self.invalid();
        }
    }

    fn set_viewport(&mut self, size: PhysicalSize) {
        self.record("set_viewport");
        let mut stats = self.stats.borrow_mut();
        stats.viewport_updates += 1;
        stats.viewport = Some(size);
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.record("clear");
        let mut stats = self.stats.borrow_mut();
        stats.clears += 1;
        stats.clear_color = Some(color);
    }

    fn set_uniforms(&mut self, program: ProgramHandle, uniforms: &UniformSet) {
        self.record("set_uniforms");
        if !self.linked.contains(&program) {
            self.invalid();
            return;
        }
        self.pending_uniforms = Some(uniforms.clone());
    }

    fn draw(
        &mut self,
        program: ProgramHandle,
        vertex_array: VertexArrayHandle,
        _vertex_count: u32,
    ) -> Result<(), FrameError> {
        self.record("draw");
        if !self.linked.contains(&program) || !self.vertex_arrays.contains(&vertex_array) {
            self.invalid();
            return Err(FrameError::Fatal("draw with invalid handles".to_string()));
        }
        if let Some(err) = self.frame_errors.borrow_mut().pop_front() {
            return Err(err);
        }
        let uniforms = self.pending_uniforms.clone().unwrap_or_default();
        let mut stats = self.stats.borrow_mut();
        stats.draw_calls += 1;
        stats.drawn_uniforms.push(uniforms);
        Ok(())
    }

    fn reconfigure(&mut self) {
        self.record("reconfigure");
        self.stats.borrow_mut().reconfigures += 1;
    }

    fn release(&mut self) {
        self.record("release");
        if !self.released {
            self.released = true;
            self.stats.borrow_mut().contexts_released += 1;
        }
    }
}

/// Host surface handing out [`HeadlessGraphics`] contexts.
pub struct HeadlessSurface {
    viewport: Cell<Viewport>,
    rect: Cell<Option<ClientRect>>,
    graphics_available: bool,
    fail_link: bool,
    stats: SharedStats,
    frame_errors: Rc<RefCell<VecDeque<FrameError>>>,
}

impl HeadlessSurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport: Cell::new(viewport),
            rect: Cell::new(None),
            graphics_available: true,
            fail_link: false,
            stats: Rc::new(RefCell::new(HeadlessStats::default())),
            frame_errors: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Simulates an environment without graphics support.
    pub fn without_graphics(mut self) -> Self {
        self.graphics_available = false;
        self
    }

    /// Makes every link attempt fail, as with mismatched stage interfaces.
    pub fn with_link_failure(mut self) -> Self {
        self.fail_link = true;
        self
    }

    pub fn with_client_rect(self, rect: ClientRect) -> Self {
        self.rect.set(Some(rect));
        self
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.viewport.set(viewport);
    }

    /// Queues an error for the next draw call.
    pub fn inject_frame_error(&self, error: FrameError) {
        self.frame_errors.borrow_mut().push_back(error);
    }

    pub fn stats(&self) -> HeadlessStats {
        self.stats.borrow().clone()
    }
}

impl HostSurface for HeadlessSurface {
    type Graphics = HeadlessGraphics;

    fn acquire_graphics(&self) -> Result<HeadlessGraphics, String> {
        if !self.graphics_available {
            return Err("headless surface has no graphics support".to_string());
        }
        Ok(HeadlessGraphics::new(
            Rc::clone(&self.stats),
            Rc::clone(&self.frame_errors),
            self.fail_link,
        ))
    }

    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    fn client_rect(&self) -> ClientRect {
        self.rect.get().unwrap_or_else(|| {
            let viewport = self.viewport.get();
            ClientRect {
                left: 0.0,
                top: 0.0,
                width: viewport.logical_width,
                height: viewport.logical_height,
            }
        })
    }
}
