//! Named uniform layouts.
//!
//! Programs expose their uniforms by name (`"model"`, `"material.shininess"`,
//! `"pointLights[3].position"`). A [`UniformLayout`] maps every such name to a
//! byte offset inside the program's uniform block. Offsets follow the WGSL
//! uniform address-space rules, so a WGSL struct declaring the same members in
//! the same order has the identical memory layout.

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Float,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    pub const fn align(self) -> usize {
        match self {
            UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec3 | UniformKind::Vec4 | UniformKind::Mat4 => 16,
        }
    }

    pub const fn size(self) -> usize {
        match self {
            UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformField {
    pub offset: usize,
    pub kind: UniformKind,
}

const fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// A struct type used as a member or array element of a uniform block.
#[derive(Clone, Debug, Default)]
pub struct StructDef {
    members: Vec<(String, UniformField)>,
    cursor: usize,
}

impl StructDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, kind: UniformKind) -> Self {
        let offset = round_up(self.cursor, kind.align());
        self.members
            .push((name.to_string(), UniformField { offset, kind }));
        self.cursor = offset + kind.size();
        self
    }

    /// Structs in the uniform address space are 16-byte aligned.
    pub fn align(&self) -> usize {
        16
    }

    pub fn size(&self) -> usize {
        round_up(self.cursor.max(1), self.align())
    }
}

#[derive(Clone, Debug, Default)]
pub struct UniformLayout {
    fields: HashMap<String, UniformField>,
    size: usize,
}

impl UniformLayout {
    pub fn builder() -> LayoutBuilder {
        LayoutBuilder::default()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> Option<UniformField> {
        self.fields.get(name).copied()
    }

    /// Size of the whole block in bytes; zero when the layout has no members.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

#[derive(Default)]
pub struct LayoutBuilder {
    fields: HashMap<String, UniformField>,
    cursor: usize,
}

impl LayoutBuilder {
    pub fn field(mut self, name: &str, kind: UniformKind) -> Self {
        let offset = round_up(self.cursor, kind.align());
        self.fields
            .insert(name.to_string(), UniformField { offset, kind });
        self.cursor = offset + kind.size();
        self
    }

    pub fn structure(mut self, name: &str, def: &StructDef) -> Self {
        let base = round_up(self.cursor, def.align());
        for (member, field) in &def.members {
            self.fields.insert(
                format!("{name}.{member}"),
                UniformField {
                    offset: base + field.offset,
                    kind: field.kind,
                },
            );
        }
        self.cursor = base + def.size();
        self
    }

    pub fn struct_array(mut self, name: &str, count: usize, def: &StructDef) -> Self {
        let base = round_up(self.cursor, def.align());
        let stride = round_up(def.size(), 16);
        for index in 0..count {
            for (member, field) in &def.members {
                self.fields.insert(
                    format!("{name}[{index}].{member}"),
                    UniformField {
                        offset: base + index * stride + field.offset,
                        kind: field.kind,
                    },
                );
            }
        }
        self.cursor = base + stride * count;
        self
    }

    pub fn build(self) -> UniformLayout {
        let size = if self.fields.is_empty() {
            0
        } else {
            round_up(self.cursor, 16)
        };
        UniformLayout {
            fields: self.fields,
            size,
        }
    }
}
