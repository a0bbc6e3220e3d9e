//! End-to-end validation tests: schema strings compiled through the
//! streaming compiler, documents driven through the reader into the
//! filter.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use xsdfilter::{Error, Result, Schema, SchemaCache, XmlReader, XsdFilter};

fn compile(source: &str) -> Arc<Schema> {
    Arc::new(Schema::from_string(source).expect("schema compiles"))
}

fn run(schema: &Arc<Schema>, document: &str) -> Result<()> {
    let mut filter = XsdFilter::new(Arc::clone(schema));
    XmlReader::parse_str(document, &mut filter)?;
    filter.finish()
}

fn assert_structural(result: Result<()>) {
    match result {
        Err(Error::Structure(_)) => {}
        other => panic!("expected a structural error, got {:?}", other.map(|_| ())),
    }
}

// ---------------------------------------------------------------------
// Content models
// ---------------------------------------------------------------------

const SEQUENCE_SCHEMA: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="e">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="a" type="xs:string"/>
        <xs:element name="b" type="xs:string"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

#[test]
fn sequence_requires_declared_order() {
    let schema = compile(SEQUENCE_SCHEMA);

    run(&schema, "<e><a/><b/></e>").unwrap();
    assert_structural(run(&schema, "<e><b/><a/></e>"));
    assert_structural(run(&schema, "<e><a/></e>"));
}

#[test]
fn choice_takes_exactly_one_branch() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="e">
    <xs:complexType>
      <xs:choice>
        <xs:element name="a" type="xs:string"/>
        <xs:element name="b" type="xs:string"/>
      </xs:choice>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
    );

    run(&schema, "<e><a/></e>").unwrap();
    run(&schema, "<e><b/></e>").unwrap();
    assert_structural(run(&schema, "<e><a/><b/></e>"));
    assert_structural(run(&schema, "<e/>"));
}

#[test]
fn all_group_is_permutation_invariant() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="e">
    <xs:complexType>
      <xs:all>
        <xs:element name="a" type="xs:string"/>
        <xs:element name="b" type="xs:string"/>
      </xs:all>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
    );

    run(&schema, "<e><a/><b/></e>").unwrap();
    run(&schema, "<e><b/><a/></e>").unwrap();
    assert_structural(run(&schema, "<e><a/></e>"));
}

#[test]
fn occurrence_bounds_two_to_three() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="e">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="c" type="xs:string" minOccurs="2" maxOccurs="3"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
    );

    assert_structural(run(&schema, "<e><c/></e>"));
    run(&schema, "<e><c/><c/></e>").unwrap();
    run(&schema, "<e><c/><c/><c/></e>").unwrap();
    assert_structural(run(&schema, "<e><c/><c/><c/><c/></e>"));
}

#[test]
fn unbounded_occurrence() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="list">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="item" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
    );

    run(&schema, "<list/>").unwrap();
    run(&schema, "<list><item/><item/><item/><item/><item/></list>").unwrap();
}

#[test]
fn nested_groups_compose() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="doc">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="head" type="xs:string"/>
        <xs:choice minOccurs="0" maxOccurs="unbounded">
          <xs:element name="p" type="xs:string"/>
          <xs:element name="note" type="xs:string"/>
        </xs:choice>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
    );

    run(&schema, "<doc><head/></doc>").unwrap();
    run(&schema, "<doc><head/><p/><note/><p/></doc>").unwrap();
    assert_structural(run(&schema, "<doc><p/></doc>"));
}

#[test]
fn element_reference_resolves_through_library() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="item" type="xs:string"/>
  <xs:element name="list">
    <xs:complexType>
      <xs:sequence>
        <xs:element ref="item" minOccurs="1" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
    );

    run(&schema, "<list><item>x</item><item>y</item></list>").unwrap();
    assert_structural(run(&schema, "<list/>"));
    // A referenced top-level element is also a valid document root
    run(&schema, "<item>alone</item>").unwrap();
}

// ---------------------------------------------------------------------
// Types and facets
// ---------------------------------------------------------------------

#[test]
fn facet_chain_min_length_then_length() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="foo">
    <xs:restriction base="xs:string">
      <xs:minLength value="10"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="foo_bar">
    <xs:restriction base="foo">
      <xs:length value="10"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:element name="v" type="foo_bar"/>
</xs:schema>"#,
    );

    run(&schema, "<v>abcdefghij</v>").unwrap();
    match run(&schema, "<v>abcdefghi</v>").unwrap_err() {
        Error::Value(e) => {
            let facet = e.facet.expect("facet is named");
            assert!(facet == "length" || facet == "minLength", "got {}", facet);
        }
        other => panic!("expected a value error, got {}", other),
    }
}

#[test]
fn enumeration_and_pattern_facets() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="code">
    <xs:restriction base="xs:string">
      <xs:pattern value="[A-Z]{2}-[0-9]+"/>
      <xs:enumeration value="AB-1"/>
      <xs:enumeration value="CD-22"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:element name="c" type="code"/>
</xs:schema>"#,
    );

    // Satisfies both pattern and enumeration
    run(&schema, "<c>AB-1</c>").unwrap();
    run(&schema, "<c>CD-22</c>").unwrap();

    // Matches the pattern but not the enumeration
    match run(&schema, "<c>ZZ-9</c>").unwrap_err() {
        Error::Value(e) => assert_eq!(e.facet.as_deref(), Some("enumeration")),
        other => panic!("expected a value error, got {}", other),
    }

    // Fails the pattern before the enumeration is consulted
    match run(&schema, "<c>nope</c>").unwrap_err() {
        Error::Value(e) => assert_eq!(e.facet.as_deref(), Some("pattern")),
        other => panic!("expected a value error, got {}", other),
    }
}

#[test]
fn numeric_bounds_on_integer_family() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="percent">
    <xs:restriction base="xs:integer">
      <xs:minInclusive value="0"/>
      <xs:maxInclusive value="100"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:element name="p" type="percent"/>
</xs:schema>"#,
    );

    run(&schema, "<p>0</p>").unwrap();
    run(&schema, "<p>100</p>").unwrap();
    assert!(run(&schema, "<p>101</p>").is_err());
    assert!(run(&schema, "<p>-1</p>").is_err());
    assert!(run(&schema, "<p>many</p>").is_err());
}

#[test]
fn whitespace_collapse_applies_before_checks() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="n" type="xs:int"/>
</xs:schema>"#,
    );

    run(&schema, "<n>  42  </n>").unwrap();
    run(&schema, "<n>\n\t7\n</n>").unwrap();
}

#[test]
fn simple_content_with_attributes() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="price">
    <xs:complexType>
      <xs:simpleContent>
        <xs:extension base="xs:decimal">
          <xs:attribute name="currency" type="xs:string" use="required"/>
        </xs:extension>
      </xs:simpleContent>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
    );

    run(&schema, r#"<price currency="EUR">9.99</price>"#).unwrap();
    assert_structural(run(&schema, "<price>9.99</price>"));
    assert!(run(&schema, r#"<price currency="EUR">cheap</price>"#).is_err());
}

#[test]
fn fragmented_character_runs_are_concatenated() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="exact">
    <xs:restriction base="xs:string">
      <xs:length value="9"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:element name="t" type="exact"/>
</xs:schema>"#,
    );

    // A CDATA section splits the text into multiple character events;
    // validation must see the whole run
    run(&schema, "<t>abcd<![CDATA[&]]>efgh</t>").unwrap();
}

// ---------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------

const ATTR_SCHEMA: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="task">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="title" type="xs:string"/>
      </xs:sequence>
      <xs:attribute name="id" type="xs:NCName" use="required"/>
      <xs:attribute name="priority" type="xs:int"/>
      <xs:attribute name="internal" type="xs:string" use="prohibited"/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

#[test]
fn attribute_strictness() {
    let schema = compile(ATTR_SCHEMA);

    run(&schema, r#"<task id="t1"><title/></task>"#).unwrap();
    run(&schema, r#"<task id="t1" priority="3"><title/></task>"#).unwrap();

    // Required attribute absent
    assert_structural(run(&schema, "<task><title/></task>"));

    // Undeclared attribute present (closed attribute set)
    assert_structural(run(&schema, r#"<task id="t1" owner="me"><title/></task>"#));

    // Prohibited attribute present
    assert_structural(run(&schema, r#"<task id="t1" internal="x"><title/></task>"#));

    // Declared attribute with an invalid value
    assert!(run(&schema, r#"<task id="t1" priority="soon"><title/></task>"#).is_err());
}

#[test]
fn namespace_declarations_are_not_instance_attributes() {
    let schema = compile(ATTR_SCHEMA);
    run(
        &schema,
        r#"<task xmlns="http://example.com/tasks" id="t1"><title/></task>"#,
    )
    .unwrap();
}

// ---------------------------------------------------------------------
// Sessions, replay, cache
// ---------------------------------------------------------------------

#[test]
fn replaying_a_valid_document_is_deterministic() {
    let schema = compile(SEQUENCE_SCHEMA);
    let doc = "<e><a>x</a><b>y</b></e>";

    for _ in 0..3 {
        run(&schema, doc).unwrap();
    }
}

#[test]
fn shared_schema_survives_a_failed_session() {
    let schema = compile(SEQUENCE_SCHEMA);

    // A failing pass leaves no residue on the shared tree
    assert_structural(run(&schema, "<e><b/></e>"));
    run(&schema, "<e><a/><b/></e>").unwrap();
}

#[test]
fn concurrent_sessions_share_one_schema() {
    let schema = compile(SEQUENCE_SCHEMA);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let schema = Arc::clone(&schema);
            std::thread::spawn(move || {
                let doc = if i % 2 == 0 {
                    "<e><a/><b/></e>"
                } else {
                    "<e><a>text</a><b>more</b></e>"
                };
                run(&schema, doc)
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
}

#[test]
fn cache_reuses_by_path_and_mtime() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seq.xsd");
    std::fs::write(&path, SEQUENCE_SCHEMA).unwrap();

    let mut cache = SchemaCache::new();
    let first = XsdFilter::from_file_cached(&path, &mut cache).unwrap();
    let second = XsdFilter::from_file_cached(&path, &mut cache).unwrap();

    // Unchanged mtime: the same compiled tree drives both validators
    assert!(Arc::ptr_eq(first.schema(), second.schema()));

    // Touch the file: recompilation, and outcomes may change with it
    let relaxed = SEQUENCE_SCHEMA.replace(
        r#"<xs:element name="b" type="xs:string"/>"#,
        r#"<xs:element name="b" type="xs:string" minOccurs="0"/>"#,
    );
    std::fs::write(&path, relaxed).unwrap();
    let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_modified(mtime + std::time::Duration::from_secs(2)).unwrap();
    drop(file);

    let third = XsdFilter::from_file_cached(&path, &mut cache).unwrap();
    assert!(!Arc::ptr_eq(first.schema(), third.schema()));

    // The old tree rejects <e><a/></e>; the recompiled one accepts it
    run(first.schema(), "<e><a/></e>").unwrap_err();
    run(third.schema(), "<e><a/></e>").unwrap();
}

#[test]
fn missing_schema_file_fails_fast() {
    match XsdFilter::from_file("/no/such/schema.xsd") {
        Err(Error::Schema(_)) => {}
        other => panic!("expected a schema error, got {:?}", other.map(|_| ())),
    }
}

// ---------------------------------------------------------------------
// Schema compilation failures
// ---------------------------------------------------------------------

#[test]
fn unsupported_schema_element_is_rejected() {
    let err = Schema::from_string(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:import namespace="http://example.com" schemaLocation="other.xsd"/>
  <xs:element name="e" type="xs:string"/>
</xs:schema>"#,
    )
    .unwrap_err();
    assert!(format!("{}", err).contains("unsupported schema element 'import'"));
}

#[test]
fn forward_type_reference_is_rejected() {
    let err = Schema::from_string(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="a">
    <xs:restriction base="b">
      <xs:minLength value="1"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="b">
    <xs:restriction base="xs:string">
      <xs:minLength value="1"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:element name="e" type="a"/>
</xs:schema>"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[test]
fn restriction_outside_simple_type_is_rejected() {
    let err = Schema::from_string(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:restriction base="xs:string"/>
</xs:schema>"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[test]
fn annotations_are_ignored() {
    let schema = compile(
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:annotation>
    <xs:documentation>Order records, v3.</xs:documentation>
  </xs:annotation>
  <xs:element name="e" type="xs:string"/>
</xs:schema>"#,
    );
    run(&schema, "<e>ok</e>").unwrap();
}

#[test]
fn position_is_reported_on_failure() {
    let schema = compile(SEQUENCE_SCHEMA);
    let mut filter = XsdFilter::new(schema);
    let err = XmlReader::parse_str("<e>\n  <b/>\n</e>", &mut filter).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("line 2"), "no position in: {}", msg);
}
