use std::fs;
use std::path::Path;
use std::sync::Arc;
use vista_dom::Document;
use vista_xslt::{Processor, Severity, Stylesheet, Transformation, XsltError};

const XSL_OPEN: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">"#;

fn processor(body: &str) -> Processor {
    let _ = env_logger::builder().is_test(true).try_init();
    let source = format!("{}{}</xsl:stylesheet>", XSL_OPEN, body);
    let doc = Document::parse(&source).unwrap();
    Processor::new(Arc::new(Stylesheet::compile(&doc, Path::new(".")).unwrap()))
}

fn run(body: &str, xml: &str) -> Transformation {
    processor(body).transform(&Document::parse(xml).unwrap())
}

/// The result tree as markup, asserting a clean run.
fn render(body: &str, xml: &str) -> String {
    let result = run(body, xml);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let doc = result.document.unwrap();
    doc.node_to_xml(doc.root())
}

const MENU: &str = r#"<menu><item id="a">Home</item><item id="b">News</item></menu>"#;

#[test]
fn test_literal_elements_and_value_of() {
    let out = render(
        r#"<xsl:template match="/"><ul><xsl:apply-templates select="menu/item"/></ul></xsl:template>
           <xsl:template match="item"><li id="i-{@id}"><xsl:value-of select="."/></li></xsl:template>"#,
        MENU,
    );
    assert_eq!(out, r#"<ul><li id="i-a">Home</li><li id="i-b">News</li></ul>"#);
}

#[test]
fn test_builtin_rules_copy_text() {
    let result = run("", r#"<a>x<b y="1">z</b><!--c--></a>"#);
    assert!(result.diagnostics.is_empty());
    assert!(!result.is_success());
    let doc = result.document.unwrap();
    assert_eq!(doc.node_to_xml(doc.root()), "xz");
}

#[test]
fn test_rule_conflicts() {
    let out = render(
        r#"<xsl:template match="/"><out><xsl:apply-templates select="menu/item"/></out></xsl:template>
           <xsl:template match="menu/item">path</xsl:template>
           <xsl:template match="item">name</xsl:template>"#,
        MENU,
    );
    assert_eq!(out, "<out>pathpath</out>");

    let out = render(
        r#"<xsl:template match="/"><out><xsl:apply-templates select="menu/item"/></out></xsl:template>
           <xsl:template match="item">first</xsl:template>
           <xsl:template match="item">last</xsl:template>
           <xsl:template match="item[@id='b']" priority="-1">low</xsl:template>"#,
        MENU,
    );
    assert_eq!(out, "<out>lastlast</out>");
}

#[test]
fn test_modes_and_params() {
    let out = render(
        r#"<xsl:template match="/"><nav><xsl:apply-templates select="menu/item" mode="nav"><xsl:with-param name="sep" select="'|'"/></xsl:apply-templates></nav></xsl:template>
           <xsl:template match="item">wrong</xsl:template>
           <xsl:template match="item" mode="nav"><xsl:param name="sep" select="'-'"/><xsl:value-of select="concat(@id, $sep)"/></xsl:template>"#,
        MENU,
    );
    assert_eq!(out, "<nav>a|b|</nav>");
}

#[test]
fn test_for_each_sorting() {
    let xml = r#"<r><n v="10"/><n v="9"/><n v="x"/><n v="100"/></r>"#;
    let sorted = |sort: &str| {
        render(
            &format!(
                r#"<xsl:template match="/"><out><xsl:for-each select="r/n">{}<xsl:value-of select="@v"/>,</xsl:for-each></out></xsl:template>"#,
                sort
            ),
            xml,
        )
    };
    assert_eq!(sorted(""), "<out>10,9,x,100,</out>");
    assert_eq!(
        sorted(r#"<xsl:sort select="@v" data-type="number"/>"#),
        "<out>x,9,10,100,</out>"
    );
    assert_eq!(
        sorted(r#"<xsl:sort select="@v" data-type="number" order="descending"/>"#),
        "<out>100,10,9,x,</out>"
    );
    assert_eq!(sorted(r#"<xsl:sort select="@v"/>"#), "<out>10,100,9,x,</out>");
}

#[test]
fn test_position_and_last_in_for_each() {
    let out = render(
        r#"<xsl:template match="/"><out><xsl:for-each select="menu/item"><xsl:value-of select="position()"/>/<xsl:value-of select="last()"/>;</xsl:for-each></out></xsl:template>"#,
        MENU,
    );
    assert_eq!(out, "<out>1/2;2/2;</out>");
}

#[test]
fn test_call_template_with_defaults() {
    let out = render(
        r#"<xsl:template match="/"><out><xsl:call-template name="greet"><xsl:with-param name="who" select="'Ada'"/></xsl:call-template><xsl:call-template name="greet"/></out></xsl:template>
           <xsl:template name="greet"><xsl:param name="who" select="'world'"/><p>Hello <xsl:value-of select="$who"/></p></xsl:template>"#,
        "<x/>",
    );
    assert_eq!(out, "<out><p>Hello Ada</p><p>Hello world</p></out>");
}

#[test]
fn test_choose_and_if() {
    let out = render(
        r#"<xsl:template match="item"><xsl:choose><xsl:when test="@id='a'">A</xsl:when><xsl:otherwise>other</xsl:otherwise></xsl:choose><xsl:if test="position() = last()">!</xsl:if></xsl:template>
           <xsl:template match="/"><out><xsl:apply-templates select="menu/item"/></out></xsl:template>"#,
        MENU,
    );
    assert_eq!(out, "<out>Aother!</out>");
}

#[test]
fn test_identity_copy() {
    let xml = r#"<a x="1"><b>t</b><!--c--></a>"#;
    let out = render(
        r#"<xsl:template match="@*|node()"><xsl:copy><xsl:apply-templates select="@*|node()"/></xsl:copy></xsl:template>"#,
        xml,
    );
    assert_eq!(out, xml);
}

#[test]
fn test_copy_of_element_and_attribute_instructions() {
    let out = render(
        r#"<xsl:template match="/">
             <out>
               <xsl:copy-of select="a/b"/>
               <xsl:copy-of select="count(a/*)"/>
               <xsl:element name="{name(a)}-x"><xsl:attribute name="n"><xsl:value-of select="1 + 1"/></xsl:attribute>body</xsl:element>
               <xsl:comment>note</xsl:comment>
             </out>
           </xsl:template>"#,
        r#"<a><b k="v">t</b></a>"#,
    );
    assert_eq!(out, r#"<out><b k="v">t</b>1<a-x n="2">body</a-x><!--note--></out>"#);
}

#[test]
fn test_copy_of_keeps_namespace_declarations() {
    let copy_of = |select: &str, xml: &str| {
        let out = render(
            &format!(r#"<xsl:template match="/"><o><xsl:copy-of select="{}"/></o></xsl:template>"#, select),
            xml,
        );
        assert!(roxmltree::Document::parse(&out).is_ok(), "{}", out);
        out
    };

    let prefixed = r#"<h:r xmlns:h="urn:h"><h:b/></h:r>"#;
    assert_eq!(copy_of("*", prefixed), r#"<o><h:r xmlns:h="urn:h"><h:b/></h:r></o>"#);
    assert_eq!(copy_of("//h:b", prefixed), r#"<o><h:b xmlns:h="urn:h"/></o>"#);

    let xhtml = r#"<div xmlns="http://www.w3.org/1999/xhtml"><p/></div>"#;
    assert_eq!(copy_of("*", xhtml), r#"<o><div xmlns="http://www.w3.org/1999/xhtml"><p/></div></o>"#);
    assert_eq!(copy_of("*/*", xhtml), r#"<o><p xmlns="http://www.w3.org/1999/xhtml"/></o>"#);

    assert_eq!(
        copy_of("a/@x:k", r#"<a xmlns:x="urn:x" x:k="1"/>"#),
        r#"<o xmlns:x="urn:x" x:k="1"/>"#
    );
}

#[test]
fn test_identity_copy_keeps_namespace_declarations() {
    let xml = r#"<h:r xmlns:h="urn:h" xmlns="urn:d"><h:b x="1"/><c/></h:r>"#;
    let out = render(
        r#"<xsl:template match="@*|node()"><xsl:copy><xsl:apply-templates select="@*|node()"/></xsl:copy></xsl:template>"#,
        xml,
    );
    assert_eq!(out, xml);
}

#[test]
fn test_content_variables_are_tree_fragments() {
    let out = render(
        r#"<xsl:variable name="badge"><b class="new">new</b>!</xsl:variable>
           <xsl:template match="/">
             <o>
               <xsl:copy-of select="$badge"/>
               <xsl:text>|</xsl:text>
               <xsl:value-of select="$badge"/>
               <xsl:if test="$badge"><xsl:text>|set</xsl:text></xsl:if>
               <xsl:call-template name="wrap"><xsl:with-param name="body"><i><xsl:value-of select="name(*)"/></i></xsl:with-param></xsl:call-template>
             </o>
           </xsl:template>
           <xsl:template name="wrap"><xsl:param name="body"/><span><xsl:copy-of select="$body"/></span></xsl:template>"#,
        "<x/>",
    );
    assert_eq!(out, r#"<o><b class="new">new</b>!|new!|set<span><i>x</i></span></o>"#);
}

#[test]
fn test_fractional_number_literals() {
    let out = render(
        r#"<xsl:template match="/"><o><xsl:value-of select="1.25"/>|<xsl:value-of select="2 * 0.5"/>|<xsl:value-of select="count(//p[. &gt; 1.5])"/></o></xsl:template>"#,
        "<l><p>1.2</p><p>1.75</p><p>3</p></l>",
    );
    assert_eq!(out, "<o>1.25|1|2</o>");
}

#[test]
fn test_keys_and_grouping() {
    let xml = r#"<list><item cat="a" n="1"/><item cat="b" n="2"/><item cat="a" n="3"/></list>"#;
    let out = render(
        r#"<xsl:key name="by-cat" match="item" use="@cat"/>
           <xsl:template match="/">
             <out>
               <xsl:for-each select="//item[generate-id() = generate-id(key('by-cat', @cat)[1])]">
                 <g c="{@cat}"><xsl:value-of select="count(key('by-cat', current()/@cat))"/></g>
               </xsl:for-each>
             </out>
           </xsl:template>"#,
        xml,
    );
    assert_eq!(out, r#"<out><g c="a">2</g><g c="b">1</g></out>"#);

    let out = render(
        r#"<xsl:template match="/"><out><xsl:for-each select="//item"><xsl:value-of select="count(//item[@cat = current()/@cat])"/></xsl:for-each></out></xsl:template>"#,
        xml,
    );
    assert_eq!(out, "<out>212</out>");
}

#[test]
fn test_format_number() {
    let out = render(
        r#"<xsl:template match="/"><o><xsl:value-of select="format-number(sum(//p), '#,##0.00')"/></o></xsl:template>"#,
        "<l><p>1000</p><p>234.5</p></l>",
    );
    assert_eq!(out, "<o>1,234.50</o>");
}

#[test]
fn test_global_params_and_content_variables() {
    let body = r#"<xsl:param name="lang" select="'en'"/>
        <xsl:variable name="greeting">Hi <xsl:value-of select="$lang"/></xsl:variable>
        <xsl:template match="/"><out><xsl:value-of select="$greeting"/></out></xsl:template>"#;
    let source = Document::parse("<x/>").unwrap();

    let mut processor = processor(body);
    let doc = processor.transform(&source).document.unwrap();
    assert_eq!(doc.node_to_xml(doc.root()), "<out>Hi en</out>");

    processor.set_parameter("lang", "de");
    assert_eq!(processor.parameters()["lang"], "de");
    let doc = processor.transform(&source).document.unwrap();
    assert_eq!(doc.node_to_xml(doc.root()), "<out>Hi de</out>");
}

#[test]
fn test_recoverable_problems_become_diagnostics() {
    let result = run(
        r#"<xsl:template match="/"><out>text<xsl:attribute name="late">x</xsl:attribute><xsl:call-template name="missing"/><xsl:element name="1bad">kept</xsl:element></out></xsl:template>"#,
        "<x/>",
    );
    assert_eq!(result.diagnostics.len(), 3);
    assert!(result.diagnostics.iter().all(|d| d.severity == Severity::Error));
    assert!(result.diagnostics[1].message.contains("missing"));
    assert!(!result.is_success());
    let doc = result.document.unwrap();
    assert_eq!(doc.node_to_xml(doc.root()), "<out>textkept</out>");
}

#[test]
fn test_fatal_problems_abort() {
    let terminated = run(
        r#"<xsl:template match="/"><out><xsl:message terminate="yes">stop <xsl:value-of select="name(*)"/></xsl:message></out></xsl:template>"#,
        "<x/>",
    );
    assert!(terminated.document.is_none());
    let last = terminated.diagnostics.last().unwrap();
    assert_eq!(last.severity, Severity::Fatal);
    assert!(last.message.contains("stop x"));

    let unknown_variable = run(r#"<xsl:template match="/"><xsl:value-of select="$nope"/></xsl:template>"#, "<x/>");
    assert!(unknown_variable.document.is_none());

    let leaked = run(
        r#"<xsl:template match="/"><xsl:variable name="local" select="1"/><xsl:call-template name="t"/></xsl:template>
           <xsl:template name="t"><xsl:value-of select="$local"/></xsl:template>"#,
        "<x/>",
    );
    assert!(leaked.document.is_none());

    // Unoptimized builds need more than the default test thread stack to hit the limit.
    let looping = std::thread::Builder::new()
        .stack_size(64 << 20)
        .spawn(|| {
            run(
                r#"<xsl:template match="/"><xsl:call-template name="loop"/></xsl:template>
                   <xsl:template name="loop"><xsl:call-template name="loop"/></xsl:template>"#,
                "<x/>",
            )
        })
        .unwrap()
        .join()
        .unwrap();
    assert!(looping.document.is_none());
    assert!(looping.diagnostics[0].message.contains("nesting"));
}

#[test]
fn test_non_terminating_message_is_not_a_diagnostic() {
    let result = run(
        r#"<xsl:template match="/"><out><xsl:message>just saying</xsl:message></out></xsl:template>"#,
        "<x/>",
    );
    assert!(result.is_success());
}

#[test]
fn test_result_receives_stylesheet_namespaces() {
    let source = r#"<xsl:stylesheet version="1.0"
            xmlns:xsl="http://www.w3.org/1999/XSL/Transform"
            xmlns="http://www.w3.org/1999/xhtml"
            xmlns:i18n="http://apache.org/cocoon/i18n/2.1">
          <xsl:output cdata-section-elements="script" omit-xml-declaration="yes"/>
          <xsl:template match="/"><html><script>a &lt; b</script></html></xsl:template>
        </xsl:stylesheet>"#;
    let stylesheet = Stylesheet::compile(&Document::parse(source).unwrap(), Path::new(".")).unwrap();
    let processor = Processor::new(Arc::new(stylesheet));
    let result = processor.transform(&Document::parse("<x/>").unwrap());
    assert!(result.is_success());
    let xml = processor.serialize(&result.document.unwrap());
    assert_eq!(
        xml,
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:i18n=\"http://apache.org/cocoon/i18n/2.1\"><script><![CDATA[a < b]]></script></html>\n"
    );
    assert!(roxmltree::Document::parse(&xml).is_ok());
}

#[test]
fn test_imports_and_includes() {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, body: &str| {
        fs::write(dir.path().join(name), format!("{}{}</xsl:stylesheet>", XSL_OPEN, body)).unwrap();
    };
    write(
        "base.xsl",
        r#"<xsl:template match="item" priority="10">base</xsl:template>
           <xsl:template match="note">note</xsl:template>"#,
    );
    fs::create_dir(dir.path().join("parts")).unwrap();
    write(
        "parts/footer.xsl",
        r#"<xsl:template name="footer"><footer/></xsl:template>"#,
    );
    write(
        "main.xsl",
        r#"<xsl:import href="base.xsl"/>
           <xsl:include href="parts/footer.xsl"/>
           <xsl:template match="/"><out><xsl:apply-templates select="r/*"/><xsl:call-template name="footer"/></out></xsl:template>
           <xsl:template match="item">main</xsl:template>"#,
    );

    let stylesheet = Stylesheet::load(&dir.path().join("main.xsl")).unwrap();
    assert_eq!(stylesheet.base_dir, dir.path());
    let processor = Processor::new(Arc::new(stylesheet));
    let result = processor.transform(&Document::parse("<r><item/><note/></r>").unwrap());
    let doc = result.document.unwrap();
    assert_eq!(doc.node_to_xml(doc.root()), "<out>mainnote<footer/></out>");
}

#[test]
fn test_module_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("self.xsl");
    fs::write(
        &path,
        format!(r#"{}<xsl:include href="self.xsl"/></xsl:stylesheet>"#, XSL_OPEN),
    )
    .unwrap();
    assert!(matches!(Stylesheet::load(&path), Err(XsltError::Module { .. })));
    assert!(matches!(
        Stylesheet::load(&dir.path().join("missing.xsl")),
        Err(XsltError::Module { .. })
    ));

    fs::write(dir.path().join("broken.xsl"), "<xsl:stylesheet").unwrap();
    assert!(matches!(
        Stylesheet::load(&dir.path().join("broken.xsl")),
        Err(XsltError::XmlParse(_))
    ));
}
