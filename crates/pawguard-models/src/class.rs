use serde::{Deserialize, Serialize};

/// Animal classes the service recognizes.
///
/// Class ids follow the standard 80-class COCO convention used by YOLO
/// exports: 15 = cat, 16 = dog. Other detector classes are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimalClass {
    Cat,
    Dog,
}

/// COCO class id for "cat" in the 80-class convention.
pub const CAT_CLASS_ID: usize = 15;

/// COCO class id for "dog" in the 80-class convention.
pub const DOG_CLASS_ID: usize = 16;

impl AnimalClass {
    /// Map a raw detector class id to an animal class, if it is one we keep.
    pub fn from_class_id(class_id: usize) -> Option<Self> {
        match class_id {
            CAT_CLASS_ID => Some(Self::Cat),
            DOG_CLASS_ID => Some(Self::Dog),
            _ => None,
        }
    }

    /// The canonical class id for this animal.
    pub fn class_id(&self) -> usize {
        match self {
            Self::Cat => CAT_CLASS_ID,
            Self::Dog => DOG_CLASS_ID,
        }
    }

    /// Wire name of the class.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cat => "cat",
            Self::Dog => "dog",
        }
    }
}
