use xmltree::{Element, XMLNode};

use crate::error::ContainerError;

pub(crate) const CONTENT_TYPES_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";
pub(crate) const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

/// Describe la información necesaria para localizar un elemento de un XML de paquete.
#[derive(Clone, Copy)]
pub(crate) struct ElementSpec<'a> {
    pub(crate) local_name: &'a str,
    pub(crate) namespace: Option<&'a str>,
}

pub(crate) const DEFAULT_SPEC: ElementSpec<'static> = ElementSpec {
    local_name: "Default",
    namespace: Some(CONTENT_TYPES_NS),
};

pub(crate) const OVERRIDE_SPEC: ElementSpec<'static> = ElementSpec {
    local_name: "Override",
    namespace: Some(CONTENT_TYPES_NS),
};

pub(crate) const RELATIONSHIP_SPEC: ElementSpec<'static> = ElementSpec {
    local_name: "Relationship",
    namespace: Some(RELATIONSHIPS_NS),
};

pub(crate) fn parse_element(bytes: &[u8]) -> Result<Element, ContainerError> {
    Ok(Element::parse(bytes)?)
}

/// Comprueba si un elemento coincide con la especificación de búsqueda.
pub(crate) fn element_matches(element: &Element, spec: &ElementSpec<'_>) -> bool {
    if element.name != spec.local_name {
        return false;
    }

    match (spec.namespace, element.namespace.as_deref()) {
        (Some(expected), Some(actual)) => expected == actual,
        (Some(_), None) => false,
        (None, _) => true,
    }
}

/// Hijos directos de `root` que coinciden con `spec`, en orden de documento.
pub(crate) fn matching_children<'e>(
    root: &'e Element,
    spec: ElementSpec<'e>,
) -> impl Iterator<Item = &'e Element> {
    root.children.iter().filter_map(move |node| match node {
        XMLNode::Element(child) if element_matches(child, &spec) => Some(child),
        _ => None,
    })
}

pub(crate) fn attribute<'e>(element: &'e Element, name: &str) -> Option<&'e str> {
    element.attributes.get(name).map(String::as_str)
}
