//! Attribute schema: ordered attribute names and kinds, class last.

use crate::error::TreeError;

/// How an attribute participates in induction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    serde::Serialize, serde::Deserialize,
)]
pub enum AttributeKind {
    /// Symbolic attribute; splits create one child per domain value.
    Discrete,
    /// Numeric attribute; splits create a two-way threshold partition.
    Continuous,
    /// Attribute present in the data but excluded from induction.
    Ignore,
}

/// A named attribute with its kind.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Attribute {
    name: String,
    kind: AttributeKind,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Return the attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the attribute kind.
    #[must_use]
    pub fn kind(&self) -> AttributeKind {
        self.kind
    }
}

/// Ordered list of attributes; the last one is always the class attribute.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AttributeSchema {
    attributes: Vec<Attribute>,
}

impl AttributeSchema {
    /// Build a schema from a full attribute list including the class.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::SchemaTooSmall`] | fewer than two attributes |
    /// | [`TreeError::ClassNotDiscrete`] | last attribute is not discrete |
    pub fn new(attributes: Vec<Attribute>) -> Result<Self, TreeError> {
        if attributes.len() < 2 {
            return Err(TreeError::SchemaTooSmall);
        }
        if attributes.last().map(Attribute::kind) != Some(AttributeKind::Discrete) {
            return Err(TreeError::ClassNotDiscrete);
        }
        Ok(Self { attributes })
    }

    /// Build a schema from input attributes, appending the class attribute.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::SchemaTooSmall`] when `inputs` is empty.
    pub fn from_inputs(inputs: Vec<Attribute>) -> Result<Self, TreeError> {
        let mut attributes = inputs;
        attributes.push(Attribute::new("Class", AttributeKind::Discrete));
        Self::new(attributes)
    }

    /// Return the total attribute count, class included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Return `true` if the schema holds no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Return the index of the class attribute (always the last).
    #[must_use]
    pub fn class_index(&self) -> usize {
        self.attributes.len() - 1
    }

    /// Return the attribute at `index`.
    #[must_use]
    pub fn attribute(&self, index: usize) -> &Attribute {
        &self.attributes[index]
    }

    /// Return the kind of the attribute at `index`.
    #[must_use]
    pub fn kind(&self, index: usize) -> AttributeKind {
        self.attributes[index].kind
    }

    /// Return the name of the attribute at `index`.
    #[must_use]
    pub fn name(&self, index: usize) -> &str {
        &self.attributes[index].name
    }

    /// Iterate over the indices of non-ignored input attributes.
    pub fn input_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let class = self.class_index();
        (0..class).filter(move |&i| self.attributes[i].kind != AttributeKind::Ignore)
    }

    /// Count the non-ignored input attributes.
    #[must_use]
    pub fn usable_input_count(&self) -> usize {
        self.input_indices().count()
    }
}
