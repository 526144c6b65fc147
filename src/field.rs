use std::fmt;

use serde::{Deserialize, Serialize};

use crate::selector::{Selector, Tag};

/// How a searchable dropdown is addressed.
///
/// `ordinal` counts occurrences of the combobox pattern in document order.
/// `legacy_id` is the id the widget library generates at render time; it is
/// only tried when the structural lookup fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetHandle {
    pub ordinal: usize,
    pub legacy_id: Option<String>,
}

impl WidgetHandle {
    pub fn nth(ordinal: usize) -> Self {
        Self {
            ordinal,
            legacy_id: None,
        }
    }

    /// Handle for a react-select widget whose input was rendered as
    /// `react-select-{library_index}-input`.
    pub fn react_select(ordinal: usize, library_index: u32) -> Self {
        Self {
            ordinal,
            legacy_id: Some(format!("react-select-{library_index}-input")),
        }
    }

    /// The structural pattern shared by every searchable dropdown input.
    pub fn pattern() -> Selector {
        Selector::attr(Tag::Input, "role", "combobox")
    }
}

/// What the field mapping states about a field before the page is inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclaredKind {
    /// Inspect the live element to decide between text input and select.
    Detect,
    TextArea,
    SearchableDropdown(WidgetHandle),
}

impl DeclaredKind {
    /// Tag used by the primary, name-based selector.
    pub fn primary_tag(&self) -> Tag {
        match self {
            DeclaredKind::Detect => Tag::Control,
            DeclaredKind::TextArea => Tag::TextArea,
            DeclaredKind::SearchableDropdown(_) => Tag::Input,
        }
    }
}

/// Interaction protocol chosen for a field once its element is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    TextInput,
    TextArea,
    NativeSelect,
    CustomDropdown,
}

impl FieldKind {
    /// Classify a located element by its live tag name.
    pub fn classify(declared: &DeclaredKind, tag: &str) -> Self {
        if let DeclaredKind::SearchableDropdown(_) = declared {
            return FieldKind::CustomDropdown;
        }
        match tag.to_ascii_lowercase().as_str() {
            "select" => FieldKind::NativeSelect,
            "textarea" => FieldKind::TextArea,
            _ => FieldKind::TextInput,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::TextInput => "text-input",
            FieldKind::TextArea => "textarea",
            FieldKind::NativeSelect => "native-select",
            FieldKind::CustomDropdown => "custom-dropdown",
        };
        f.write_str(name)
    }
}

/// One logical field and the value it should receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub value: String,
    pub declared: DeclaredKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            declared: DeclaredKind::Detect,
        }
    }

    pub fn textarea(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            declared: DeclaredKind::TextArea,
            ..Self::new(name, value)
        }
    }

    pub fn dropdown(name: impl Into<String>, value: impl Into<String>, handle: WidgetHandle) -> Self {
        Self {
            declared: DeclaredKind::SearchableDropdown(handle),
            ..Self::new(name, value)
        }
    }
}

/// The intake mapping, in the order fields are filled.
pub fn intake_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("nombre", "John"),
        FieldSpec::new("apellidos", "Doe"),
        FieldSpec::new("telefono", "1234567890"),
        FieldSpec::new("correo", "john.doe@example.com"),
        FieldSpec::new("direccion", "123 Main Street"),
        FieldSpec::dropdown("pais", "Colombia", WidgetHandle::react_select(0, 2)),
        FieldSpec::dropdown("ciudad", "Bogota", WidgetHandle::react_select(1, 3)),
        FieldSpec::dropdown("estado", "Cundinamarca", WidgetHandle::react_select(2, 4)),
        FieldSpec::new("codigoPostal", "110111"),
        FieldSpec::new("ocupacion", "Software Engineer"),
        FieldSpec::new("empresa", "Tech Corp"),
        FieldSpec::textarea("datosAdicionales", "Additional information about the applicant"),
    ]
}
