//! Text reconstruction of a decoded manifest with resource references resolved.

use crate::android::binary_xml::{XmlAttribute, XmlElement, ANDROID_NAMESPACE_URI};
use crate::android::config::ResConfig;
use crate::android::res_table::ResTable;
use crate::android::resolve::{resolve, LocaleView, ValueLookup};
use crate::android::value::{render, Value};
use log::{debug, warn};
use std::borrow::Cow;
use std::collections::BTreeMap;

const INDENT: &str = "    ";
const LABEL_KEY: &str = "application-label";

/// Manifest text plus the application label in every locale the table provides.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderedManifest {
    pub text: String,
    pub display_names: BTreeMap<String, String>,
}

/// Walks an element tree and writes indented XML, one tag per line.
pub struct ManifestPrinter<'a, L: ValueLookup + ?Sized> {
    lookup: &'a L,
    table: Option<&'a ResTable>,
    out: String,
    depth: usize,
    display_names: BTreeMap<String, String>,
}

impl<'a, L: ValueLookup + ?Sized> ManifestPrinter<'a, L> {
    /// `lookup` resolves attribute references; `table`, when present, supplies the locales for
    /// the application label.
    pub fn new(lookup: &'a L, table: Option<&'a ResTable>) -> Self {
        ManifestPrinter {
            lookup,
            table,
            out: String::new(),
            depth: 0,
            display_names: BTreeMap::new(),
        }
    }

    pub fn print(mut self, root: &XmlElement) -> RenderedManifest {
        self.visit(root);
        RenderedManifest {
            text: self.out,
            display_names: self.display_names,
        }
    }

    fn visit(&mut self, element: &XmlElement) {
        self.indent();
        self.out.push('<');
        self.out.push_str(&element.name);
        for decl in &element.namespace_decls {
            if decl.prefix.is_empty() {
                self.out.push_str(&format!(" xmlns=\"{}\"", decl.uri));
            } else {
                self.out.push_str(&format!(" xmlns:{}=\"{}\"", decl.prefix, decl.uri));
            }
        }
        for attr in &element.attributes {
            let value = attribute_text(attr, self.lookup);
            if element.name == "application" && attr.name == "label" {
                if let Some(table) = self.table {
                    self.display_names = application_labels(attr, table);
                }
            }
            self.out.push(' ');
            self.out.push_str(&display_name(attr));
            self.out.push_str("=\"");
            self.out.push_str(&escape_attribute(&value));
            self.out.push('"');
        }

        if element.children.is_empty() {
            self.out.push_str("/>\n");
            return;
        }
        self.out.push_str(">\n");
        self.depth += 1;
        for child in &element.children {
            self.visit(child);
        }
        self.depth -= 1;
        self.indent();
        self.out.push_str(&format!("</{}>\n", element.name));
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }
}

/// `name`, `android:name` or `<uri>:name`.
pub fn display_name(attr: &XmlAttribute) -> Cow<'_, str> {
    if attr.namespace_uri.is_empty() {
        Cow::Borrowed(&attr.name)
    } else if attr.namespace_uri == ANDROID_NAMESPACE_URI {
        Cow::Owned(format!("android:{}", attr.name))
    } else {
        Cow::Owned(format!("{}:{}", attr.namespace_uri, attr.name))
    }
}

/// The attribute's value with a resource reference resolved. Attributes that are not references,
/// and references that do not resolve, keep their raw text.
pub fn attribute_text<'v, L>(attr: &'v XmlAttribute, lookup: &'v L) -> Cow<'v, str>
where
    L: ValueLookup + ?Sized,
{
    let Some(Value::Reference(reference)) = &attr.compiled else {
        return Cow::Borrowed(&attr.raw);
    };
    match resolve(reference, lookup) {
        Ok(value) => render(value).unwrap_or(Cow::Borrowed(&attr.raw)),
        Err(err) => {
            debug!("attribute {}: {err}, using raw text", attr.name);
            Cow::Borrowed(&attr.raw)
        }
    }
}

/// Resolve the application label once per locale present in the table.
fn application_labels(attr: &XmlAttribute, table: &ResTable) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    for locale in table.locales() {
        let view = LocaleView::new(table, ResConfig::canonical_for_locale(locale));
        let label = match &attr.compiled {
            Some(Value::Reference(reference)) => match resolve(reference, &view) {
                Ok(value) => render(value).map(Cow::into_owned),
                Err(err) => {
                    warn!("application label for locale {:?}: {err}", locale.tag());
                    None
                }
            },
            _ => Some(attribute_text(attr, &view).into_owned()),
        };
        let Some(label) = label.filter(|label| !label.is_empty()) else {
            continue;
        };
        let tag = locale.tag();
        let key = if tag.is_empty() {
            LABEL_KEY.to_string()
        } else {
            format!("{LABEL_KEY}-{tag}")
        };
        labels.insert(key, normalize_for_output(&label));
    }
    labels
}

/// Escape a value for a double-quoted attribute. Ampersands go first so the entities produced for
/// quotes are not escaped again.
pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '"']) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(value.replace('&', "&amp;").replace('"', "&quot;"))
}

/// Backslash-escape backslashes, newlines and double quotes.
pub fn normalize_for_output(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::binary_xml::NamespaceDecl;
    use crate::android::config::Locale;
    use crate::android::resolve::TableIndex;
    use crate::android::value::{Primitive, PrimitiveKind, Reference, ResId, TYPE_INT_DEC, TYPE_REFERENCE};
    use crate::tests::fixtures::{TableBuilder, TableValue};

    fn attr(namespace_uri: &str, name: &str, raw: &str, compiled: Option<Value>) -> XmlAttribute {
        XmlAttribute {
            namespace_uri: namespace_uri.to_string(),
            name: name.to_string(),
            raw: raw.to_string(),
            compiled,
        }
    }

    fn plain(name: &str, raw: &str) -> XmlAttribute {
        attr("", name, raw, Some(Value::RawString(raw.to_string())))
    }

    fn print(root: &XmlElement, index: &TableIndex, table: Option<&ResTable>) -> RenderedManifest {
        ManifestPrinter::new(index, table).print(root)
    }

    #[test]
    fn prints_nested_elements_with_indentation() {
        let mut root = XmlElement::new("manifest");
        root.namespace_decls.push(NamespaceDecl {
            prefix: "android".into(),
            uri: ANDROID_NAMESPACE_URI.into(),
        });
        root.attributes.push(plain("package", "com.example.app"));
        let mut application = XmlElement::new("application");
        let mut activity = XmlElement::new("activity");
        activity
            .attributes
            .push(attr(ANDROID_NAMESPACE_URI, "name", ".Main", Some(Value::RawString(".Main".into()))));
        application.children.push(activity);
        root.children.push(application);
        root.children.push(XmlElement::new("uses-sdk"));

        let rendered = print(&root, &TableIndex::default(), None);
        assert_eq!(
            rendered.text,
            "<manifest xmlns:android=\"http://schemas.android.com/apk/res/android\" package=\"com.example.app\">\n\
             \x20   <application>\n\
             \x20       <activity android:name=\".Main\"/>\n\
             \x20   </application>\n\
             \x20   <uses-sdk/>\n\
             </manifest>\n"
        );
        assert!(rendered.display_names.is_empty());
    }

    #[test]
    fn default_namespace_and_foreign_attribute_names() {
        let mut root = XmlElement::new("manifest");
        root.namespace_decls.push(NamespaceDecl {
            prefix: String::new(),
            uri: "urn:default".into(),
        });
        root.attributes.push(attr("urn:tools", "ignore", "x", None));
        let rendered = print(&root, &TableIndex::default(), None);
        assert_eq!(rendered.text, "<manifest xmlns=\"urn:default\" urn:tools:ignore=\"x\"/>\n");
    }

    #[test]
    fn raw_text_survives_except_quotes_and_ampersands() {
        let mut root = XmlElement::new("meta-data");
        root.attributes.push(plain("value", "a & \"b\" <c> 'd'"));
        root.attributes.push(attr("", "empty", "", None));
        let rendered = print(&root, &TableIndex::default(), None);
        assert_eq!(
            rendered.text,
            "<meta-data value=\"a &amp; &quot;b&quot; <c> 'd'\" empty=\"\"/>\n"
        );
    }

    #[test]
    fn escaping_does_not_double_escape() {
        assert_eq!(escape_attribute("plain"), Cow::Borrowed("plain"));
        assert_eq!(escape_attribute("\"&\""), "&quot;&amp;&quot;");
        assert_eq!(escape_attribute("&quot;"), "&amp;quot;");
    }

    #[test]
    fn references_resolve_through_the_index() {
        let mut builder = TableBuilder::new(0x7f, "com.example.app");
        let number = builder.add("integer", "code", ResConfig::default(), TableValue::Typed(TYPE_INT_DEC, 42));
        let alias = builder.add("string", "alias", ResConfig::default(), TableValue::Typed(TYPE_REFERENCE, number.0));
        let table = ResTable::parse(&builder.to_bytes()).expect("table");
        let index = TableIndex::build(&table, &ResConfig::canonical());

        let mut root = XmlElement::new("manifest");
        root.attributes.push(attr(
            ANDROID_NAMESPACE_URI,
            "versionCode",
            "@0x7f020000",
            Some(Value::Reference(Reference::to(alias))),
        ));
        root.attributes.push(attr(
            ANDROID_NAMESPACE_URI,
            "theme",
            "@0x01030000",
            Some(Value::Reference(Reference::to(ResId(0x0103_0000)))),
        ));
        root.attributes.push(attr(
            ANDROID_NAMESPACE_URI,
            "minSdkVersion",
            "21",
            Some(Value::Primitive(Primitive::new(PrimitiveKind::IntDec, 21))),
        ));
        let rendered = print(&root, &index, Some(&table));
        assert_eq!(
            rendered.text,
            "<manifest android:versionCode=\"42\" android:theme=\"@0x01030000\" android:minSdkVersion=\"21\"/>\n"
        );
    }

    #[test]
    fn compiled_non_references_print_as_written() {
        // Only references go through the renderer; a boolean stays `true`, never its payload.
        let index = TableIndex::default();
        let cases = [
            ("debuggable", "true", PrimitiveKind::Boolean, 0xFFFF_FFFF),
            ("allowBackup", "false", PrimitiveKind::Boolean, 0),
            ("color", "#ff0080ff", PrimitiveKind::ColorArgb8, 0xFF00_80FF),
            ("flags", "0x10", PrimitiveKind::IntHex, 0x10),
        ];
        for (name, raw, kind, data) in cases {
            let value = Value::Primitive(Primitive::new(kind, data));
            let attribute = attr(ANDROID_NAMESPACE_URI, name, raw, Some(value.clone()));
            assert_eq!(attribute_text(&attribute, &index), raw);
            assert_eq!(render(&value).as_deref(), Some(data.to_string().as_str()));
        }

        let mut root = XmlElement::new("application");
        root.attributes.push(attr(
            ANDROID_NAMESPACE_URI,
            "debuggable",
            "true",
            Some(Value::Primitive(Primitive::new(PrimitiveKind::Boolean, 0xFFFF_FFFF))),
        ));
        let rendered = print(&root, &index, None);
        assert_eq!(rendered.text, "<application android:debuggable=\"true\"/>\n");
    }

    #[test]
    fn collects_application_labels_per_locale() {
        let mut builder = TableBuilder::new(0x7f, "com.example.app");
        let label = builder.add("string", "app_name", ResConfig::default(), TableValue::String("Say \"hi\"\nnow"));
        builder.add(
            "string",
            "app_name",
            ResConfig::default().with_locale(Locale {
                language: *b"fr",
                country: *b"CA",
            }),
            TableValue::String("Salut"),
        );
        let table = ResTable::parse(&builder.to_bytes()).expect("table");
        let index = TableIndex::build(&table, &ResConfig::canonical());

        let mut root = XmlElement::new("manifest");
        let mut application = XmlElement::new("application");
        application.attributes.push(attr(
            ANDROID_NAMESPACE_URI,
            "label",
            "@0x7f010000",
            Some(Value::Reference(Reference::to(label))),
        ));
        root.children.push(application);

        let rendered = print(&root, &index, Some(&table));
        assert!(rendered.text.contains("android:label=\"Say &quot;hi&quot;\nnow\""));
        let expected: BTreeMap<String, String> = [
            ("application-label".to_string(), "Say \\\"hi\\\"\\nnow".to_string()),
            ("application-label-fr-CA".to_string(), "Salut".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(rendered.display_names, expected);
    }

    #[test]
    fn normalizes_labels() {
        assert_eq!(normalize_for_output("a\\b\n\"c\""), "a\\\\b\\n\\\"c\\\"");
    }
}
