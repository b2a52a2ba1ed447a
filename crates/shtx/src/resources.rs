//! Graphics resources as handed over by the archive, and dispatch on their
//! payload kind.

pub mod types;

use std::fmt::Display;

use image::{Rgba, RgbaImage};

use crate::{
    animation::{AnimationError, AnimationRun},
    compose::{self, Background, ComposeError, TextureSource},
    ids::{self, ResourceId},
    options::{AnimationOptions, ImportOptions, ReplaceOptions},
    palette::PaletteError,
    pixels::{CodecError, ImageForm},
    utils::mem_reader::MemReaderError,
};

use self::types::{
    animation::{Animation, AnimationStyle},
    layout::Layout,
    texture::{ImportError, Texture},
};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Bad magic: expected {expected:?}, found {actual:?}")]
    BadMagic { expected: [u8; 4], actual: [u8; 4] },
    #[error("Unknown pixel form code {code:#X}")]
    UnknownPixelForm { code: u16 },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Read(#[from] MemReaderError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    Layout,
    Animation,
    Unknown,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Texture => write!(f, "SHTX"),
            ResourceKind::Layout => write!(f, "LAYOUT"),
            ResourceKind::Animation => write!(f, "ANIMATION"),
            ResourceKind::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceErrorKind {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Palette(#[from] PaletteError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Animation(#[from] AnimationError),
    #[error("Expected a {expected} resource, found {actual}")]
    WrongKind {
        expected: ResourceKind,
        actual: ResourceKind,
    },
}

/// A failure tied to the resource it happened on.
#[derive(Debug, thiserror::Error)]
#[error("Resource {id}: {source}")]
pub struct ResourceError {
    pub id: ResourceId,
    pub source: ResourceErrorKind,
}

impl ResourceError {
    fn new(id: &ResourceId, source: impl Into<ResourceErrorKind>) -> Self {
        ResourceError {
            id: id.clone(),
            source: source.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Texture(Texture),
    Layout(Layout),
    Animation(Animation),
    /// Bytes of a resource this crate does not interpret, kept verbatim.
    Unknown(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphicsResource {
    id: ResourceId,
    payload: Payload,
}

impl GraphicsResource {
    /// Parses a payload, choosing its kind from the data and the resource
    /// name. Textures use the resource's default image form.
    pub fn parse(id: ResourceId, data: &[u8]) -> Result<Self, ResourceError> {
        let image_form = ids::default_image_form(id.index());
        Self::parse_with_form(id, data, image_form)
    }

    /// Like [`GraphicsResource::parse`], but textures are read in
    /// `image_form` regardless of the resource index.
    pub fn parse_with_form(
        id: ResourceId,
        data: &[u8],
        image_form: ImageForm,
    ) -> Result<Self, ResourceError> {
        let payload =
            Self::parse_payload(&id, data, image_form).map_err(|err| ResourceError::new(&id, err))?;
        Ok(GraphicsResource { id, payload })
    }

    fn parse_payload(
        id: &ResourceId,
        data: &[u8],
        image_form: ImageForm,
    ) -> Result<Payload, ParseError> {
        if Texture::has_magic(data) {
            return Texture::parse(data, image_form).map(Payload::Texture);
        }
        if id.is_layout_name() {
            return Layout::parse(data).map(Payload::Layout);
        }
        if id.is_animation_name() {
            return Animation::parse(data, AnimationStyle::from_id(id)).map(Payload::Animation);
        }
        log::warn!("{id} is not a recognized graphics resource, passing it through");
        Ok(Payload::Unknown(data.to_vec()))
    }

    /// Creates a texture resource from a bitmap.
    pub fn new_texture(
        id: ResourceId,
        image: &RgbaImage,
        options: &ImportOptions,
    ) -> Result<Self, ResourceError> {
        let texture =
            Texture::from_image(image, options).map_err(|err| ResourceError::new(&id, err))?;
        Ok(GraphicsResource {
            id,
            payload: Payload::Texture(texture),
        })
    }

    #[must_use]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self.payload {
            Payload::Texture(_) => ResourceKind::Texture,
            Payload::Layout(_) => ResourceKind::Layout,
            Payload::Animation(_) => ResourceKind::Animation,
            Payload::Unknown(_) => ResourceKind::Unknown,
        }
    }

    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[must_use]
    pub fn texture(&self) -> Option<&Texture> {
        match &self.payload {
            Payload::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn texture_mut(&mut self) -> Option<&mut Texture> {
        match &mut self.payload {
            Payload::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    #[must_use]
    pub fn layout(&self) -> Option<&Layout> {
        match &self.payload {
            Payload::Layout(layout) => Some(layout),
            _ => None,
        }
    }

    pub fn layout_mut(&mut self) -> Option<&mut Layout> {
        match &mut self.payload {
            Payload::Layout(layout) => Some(layout),
            _ => None,
        }
    }

    #[must_use]
    pub fn animation(&self) -> Option<&Animation> {
        match &self.payload {
            Payload::Animation(animation) => Some(animation),
            _ => None,
        }
    }

    fn wrong_kind(&self, expected: ResourceKind) -> ResourceError {
        ResourceError::new(
            &self.id,
            ResourceErrorKind::WrongKind {
                expected,
                actual: self.kind(),
            },
        )
    }

    fn require_texture(&self) -> Result<&Texture, ResourceError> {
        self.texture()
            .ok_or_else(|| self.wrong_kind(ResourceKind::Texture))
    }

    fn require_texture_mut(&mut self) -> Result<&mut Texture, ResourceError> {
        let actual = self.kind();
        match &mut self.payload {
            Payload::Texture(texture) => Ok(texture),
            _ => Err(ResourceError::new(
                &self.id,
                ResourceErrorKind::WrongKind {
                    expected: ResourceKind::Texture,
                    actual,
                },
            )),
        }
    }

    /// Renders the texture. Pixels whose index equals `transparent_key` are
    /// fully transparent.
    pub fn to_image(&self, transparent_key: Option<u8>) -> Result<RgbaImage, ResourceError> {
        self.require_texture()?
            .to_image(transparent_key)
            .map_err(|err| ResourceError::new(&self.id, err))
    }

    /// Renders the texture reinterpreted at another width.
    pub fn to_image_with_width(
        &self,
        width: u32,
        transparent_key: Option<u8>,
    ) -> Result<RgbaImage, ResourceError> {
        self.require_texture()?
            .to_image_with_width(width, transparent_key)
            .map_err(|err| ResourceError::new(&self.id, err))
    }

    pub fn import_image(
        &mut self,
        image: &RgbaImage,
        options: &ReplaceOptions,
    ) -> Result<(), ResourceError> {
        let id = self.id.clone();
        self.require_texture_mut()?
            .import_image(image, options)
            .map_err(|err| ResourceError::new(&id, err))
    }

    pub fn set_palette(
        &mut self,
        colors: &[Rgba<u8>],
        transparent_index: Option<usize>,
    ) -> Result<(), ResourceError> {
        let id = self.id.clone();
        self.require_texture_mut()?
            .set_palette(colors, transparent_index)
            .map_err(|err| ResourceError::new(&id, err))
    }

    /// Composites this layout's entries against `textures`.
    pub fn compose<T>(&self, textures: &T, background: Background) -> Result<RgbaImage, ResourceError>
    where
        T: TextureSource + ?Sized,
    {
        let layout = self
            .layout()
            .ok_or_else(|| self.wrong_kind(ResourceKind::Layout))?;
        compose::compose(layout.entries(), textures, background)
            .map_err(|err| ResourceError::new(&self.id, err))
    }

    /// Composites `count` of this layout's entries starting at `start`.
    pub fn compose_range<T>(
        &self,
        start: usize,
        count: usize,
        textures: &T,
        background: Background,
    ) -> Result<RgbaImage, ResourceError>
    where
        T: TextureSource + ?Sized,
    {
        let layout = self
            .layout()
            .ok_or_else(|| self.wrong_kind(ResourceKind::Layout))?;
        compose::compose_range(layout.entries(), start, count, textures, background)
            .map_err(|err| ResourceError::new(&self.id, err))
    }

    /// Primes this animation against `target`, which must be a texture.
    pub fn animate<'t>(
        &self,
        target: &'t mut GraphicsResource,
        options: &AnimationOptions,
    ) -> Result<AnimationRun<'t>, ResourceError> {
        let animation = self
            .animation()
            .ok_or_else(|| self.wrong_kind(ResourceKind::Animation))?;
        AnimationRun::new(animation, target, options)
            .map_err(|err| ResourceError::new(&self.id, err))
    }

    /// Serializes the payload. Resources that were not modified come back
    /// byte for byte.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.payload {
            Payload::Texture(texture) => texture.to_bytes(),
            Payload::Layout(layout) => layout.to_bytes(),
            Payload::Animation(animation) => animation.to_bytes(),
            Payload::Unknown(data) => data.clone(),
        }
    }
}

impl Display for GraphicsResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.id.index();
        write!(
            f,
            "{index:03X} {index:04} ({}) - {}",
            self.kind(),
            self.id.name()
        )
    }
}
