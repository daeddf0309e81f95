//! Source synthesis: wraps the accumulated session text into a complete
//! translation unit whose `main` prints the value of the last expression.
//!
//! The value is captured by an `auto` binding initialised with a GNU
//! statement expression, then matched against an ordered table of
//! [`PrintRule`]s using `typeid`. The first rule whose type matches decides
//! how the value is printed; a value no rule knows is reported with its
//! mangled type name and size.

use std::fmt::Write;

use crate::buffer::is_terminated;

/// Signature of the synthesized entry point. Diagnostics mentioning it carry
/// no information for the user.
pub const ENTRY_POINT: &str = "int main()";

/// Which program to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Bind the value of the last sub-expression and print it.
    Printing,
    /// Discard the value: the block always ends with a `void *` expression.
    Safe,
}

/// How a matched value is written to `std::cout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Render {
    /// Dereference as `char *` and print between double quotes.
    QuotedCStr,
    /// Stream the value between double quotes.
    Quoted,
    /// Convert to the given integer type before streaming.
    CodePoint(&'static str),
    /// Stream the value as is.
    Plain,
    /// `true` or `false`.
    Boolean,
    /// Print nothing at all.
    Silent,
    /// Hand-written statement; `{v}` is replaced by the typed value.
    Custom(&'static str),
}

/// One link of the first-match dispatch chain.
#[derive(Debug, Clone, Copy)]
pub struct PrintRule {
    /// Any of these types selects the rule. The first one is used to cast the
    /// erased value pointer.
    pub types: &'static [&'static str],
    /// How the matched value is written.
    pub render: Render,
}

const fn rule(types: &'static [&'static str], render: Render) -> PrintRule {
    PrintRule { types, render }
}

/// Rules tried before any profile-specific ones.
pub const STANDARD_RULES: &[PrintRule] = &[
    rule(&["char *", "unsigned char *", "char const *"], Render::QuotedCStr),
    rule(&["std::string"], Render::Quoted),
    rule(&["char"], Render::CodePoint("int")),
    rule(&["signed char"], Render::CodePoint("int")),
    rule(&["unsigned char"], Render::CodePoint("unsigned int")),
    rule(&["short"], Render::Plain),
    rule(&["unsigned short"], Render::Plain),
    rule(&["int"], Render::Plain),
    rule(&["unsigned int"], Render::Plain),
    rule(&["long"], Render::Plain),
    rule(&["unsigned long"], Render::Plain),
    rule(&["long long"], Render::Plain),
    rule(&["unsigned long long"], Render::Plain),
    rule(&["float"], Render::Plain),
    rule(&["double"], Render::Plain),
    rule(&["long double"], Render::Plain),
    rule(&["bool"], Render::Boolean),
];

/// Rule that ends every chain, right before the unknown-type fallback.
pub const SILENT_RULE: PrintRule = rule(&["void *"], Render::Silent);

const QT_RULES: &[PrintRule] = &[
    rule(&["qint64"], Render::Plain),
    rule(&["quint64"], Render::Plain),
    rule(&["QString"], Render::Custom("std::cout << '\"' << qPrintable({v}) << '\"' << std::endl;")),
    rule(
        &["QLatin1String"],
        Render::Custom("std::cout << '\"' << ({v}).latin1() << '\"' << std::endl;"),
    ),
    rule(
        &["QChar"],
        Render::Custom("std::cout << '\\'' << qPrintable(QString({v})) << '\\'' << std::endl;"),
    ),
    rule(
        &["QStringList", "QList<QString>"],
        Render::Custom(
            "QStringList cpi_list_;\n    for (const auto &s : {v}) cpi_list_ << QChar('\"') + s + QChar('\"');\n    std::cout << '[' << qPrintable(cpi_list_.join(\", \")) << ']' << std::endl;",
        ),
    ),
];

const QT_HEADERS: &str = "#include <QtCore>\n#include <QStringList>\n#include <QChar>\n#include <QTextCodec>\n";

const QT_INIT: &str = "  QTextCodec *cpi_codec_ = QTextCodec::codecForName(\"UTF-8\");\n  QTextCodec::setCodecForLocale(cpi_codec_);\n";

/// Extra headers, start-up code and print rules layered on the standard chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Standard,
    /// Qt Core types (`QString`, `QStringList`, ...).
    Qt,
}

impl Profile {
    fn headers(self) -> &'static str {
        match self {
            Self::Standard => "",
            Self::Qt => QT_HEADERS,
        }
    }

    fn init(self) -> &'static str {
        match self {
            Self::Standard => "",
            Self::Qt => QT_INIT,
        }
    }

    fn rules(self) -> &'static [PrintRule] {
        match self {
            Self::Standard => &[],
            Self::Qt => QT_RULES,
        }
    }

    /// The complete dispatch chain in match order.
    pub fn chain(self) -> impl Iterator<Item = &'static PrintRule> {
        STANDARD_RULES
            .iter()
            .chain(self.rules())
            .chain(std::iter::once(&SILENT_RULE))
    }
}

/// Builds translation units from rendered session text.
#[derive(Debug, Clone)]
pub struct SourceSynthesizer<'a> {
    headers: &'a str,
    statements: &'a str,
    profile: Profile,
}

impl<'a> SourceSynthesizer<'a> {
    /// Synthesizer for the standard profile. `statements` must already carry
    /// the `;` of closed lines, as [`SnippetBuffer::render`] produces.
    ///
    /// [`SnippetBuffer::render`]: crate::buffer::SnippetBuffer::render
    pub fn new(headers: &'a str, statements: &'a str) -> Self {
        Self {
            headers,
            statements,
            profile: Profile::Standard,
        }
    }

    /// Use the headers, setup code and print rules of `profile`.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Produce the full source for `variant`.
    pub fn generate(&self, variant: Variant) -> String {
        let mut src = String::new();
        src.push_str("#include <iostream>\n#include <string>\n#include <typeinfo>\n");
        src.push_str(self.headers);
        src.push('\n');
        src.push_str(self.profile.headers());
        src.push('\n');
        let _ = writeln!(src, "{ENTRY_POINT} {{");
        src.push_str(self.profile.init());
        src.push_str("  auto cpi_value_ = ({ ");
        src.push_str(self.statements);
        match variant {
            Variant::Printing if !is_terminated(self.statements) => src.push_str("\n;"),
            Variant::Printing => {}
            Variant::Safe => src.push_str("\n(void *)0;"),
        }
        src.push_str("});\n");
        src.push_str("  void *cpi_ptr_ = (void *)&cpi_value_;\n");
        src.push_str("  const std::type_info &cpi_type_ = typeid(cpi_value_);\n");

        let mut keyword = "if";
        for rule in self.profile.chain() {
            let cond = rule
                .types
                .iter()
                .map(|ty| format!("cpi_type_ == typeid({ty})"))
                .collect::<Vec<_>>()
                .join(" || ");
            let _ = writeln!(src, "  {keyword} ({cond}) {{");
            let body = render_body(rule);
            if !body.is_empty() {
                let _ = writeln!(src, "    {body}");
            }
            src.push_str("  }");
            keyword = " else if";
        }
        src.push_str(" else {\n");
        src.push_str(
            "    std::cout << \"# cannot print value : name:\" << cpi_type_.name() << \"  size:\" << sizeof(cpi_value_) << std::endl;\n",
        );
        src.push_str("  }\n  return 0;\n}\n");
        src
    }
}

fn render_body(rule: &PrintRule) -> String {
    let ty = rule.types[0];
    let value = format!("(*({ty} *)cpi_ptr_)");
    match rule.render {
        Render::QuotedCStr => {
            "std::cout << '\"' << (*(char **)cpi_ptr_) << '\"' << std::endl;".to_string()
        }
        Render::Quoted => format!("std::cout << '\"' << {value} << '\"' << std::endl;"),
        Render::CodePoint(int_ty) => format!("std::cout << ({int_ty}){value} << std::endl;"),
        Render::Plain => format!("std::cout << {value} << std::endl;"),
        Render::Boolean => format!("std::cout << ({value} ? \"true\" : \"false\") << std::endl;"),
        Render::Silent => String::new(),
        Render::Custom(template) => template.replace("{v}", &value),
    }
}
