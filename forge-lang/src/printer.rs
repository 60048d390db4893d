//! Pretty-print a parsed [`File`] back to FORGE source text.
//!
//! One routine per declaration variant, mirroring the parser's dispatch.
//! Comments and blank lines are not recovered here (the lexer keeps them
//! for a future source-preserving printer); this renders the AST's
//! canonical form.

use crate::parser::ast::*;

fn indent_str(level: usize) -> String {
    "    ".repeat(level)
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render `file` as FORGE source, one declaration per top-level block.
pub fn print_file(file: &File) -> String {
    let mut output = String::new();
    for decl in &file.decls {
        output.push_str(&print_decl(decl));
        output.push('\n');
    }
    output
}

fn print_decl(decl: &Decl) -> String {
    match decl {
        Decl::App(d) => print_app(d),
        Decl::Entity(d) => print_entity(d),
        Decl::Relation(d) => print_relation(d),
        Decl::Rule(d) => print_rule(d),
        Decl::Access(d) => print_access(d),
        Decl::Action(d) => print_properties_block("action", &d.name, &d.properties),
        Decl::Message(d) => print_message(d),
        Decl::Job(d) => print_job(d),
        Decl::Hook(d) => print_hook(d),
        Decl::View(d) => print_view(d),
        Decl::Webhook(d) => print_webhook(d),
        Decl::Imperative(d) => print_imperative(d),
        Decl::Migrate(d) => print_migrate(d),
        Decl::Test(d) => print_test(d),
    }
}

fn print_app(app: &AppDecl) -> String {
    print_properties_block("app", &app.name, &app.properties)
}

fn print_properties_block(keyword: &str, name: &str, properties: &[(String, Expr)]) -> String {
    let mut out = format!("{keyword} {name} {{\n");
    for (key, value) in properties {
        out.push_str(&format!("{}{key}: {}\n", indent_str(1), print_expr(value)));
    }
    out.push_str("}\n");
    out
}

fn print_type_expr(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Named { name, .. } => name.clone(),
        TypeExpr::Enum { members, .. } => format!("enum({})", members.join(", ")),
    }
}

fn print_compare_op(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
        CompareOp::Eq => "==",
        CompareOp::Ne => "!=",
    }
}

fn print_field(field: &FieldDecl) -> String {
    let mut out = format!("{}: {}", field.name, print_type_expr(&field.type_expr));
    for constraint in &field.constraints {
        match constraint {
            Constraint::Unique(_) => out.push_str(" unique"),
            Constraint::Length(_, op, n) => out.push_str(&format!(" length {} {n}", print_compare_op(*op))),
        }
    }
    if let Some(default) = &field.default {
        out.push_str(&format!(" = {}", print_expr(default)));
    }
    out
}

fn print_entity(entity: &EntityDecl) -> String {
    let mut out = format!("entity {} {{\n", entity.name);
    for field in &entity.fields {
        out.push_str(&format!("{}{}\n", indent_str(1), print_field(field)));
    }
    out.push_str("}\n");
    out
}

fn print_relation(relation: &RelationDecl) -> String {
    let mut out = format!(
        "relation {}.{} -> {}",
        relation.source_entity, relation.source_field, relation.target_entity
    );
    if relation.many {
        out.push_str(" many");
    }
    out.push('\n');
    out
}

fn print_rule(rule: &RuleDecl) -> String {
    let mut out = format!("rule {}.{} {{\n", rule.target_entity, rule.target_operation);
    for clause in &rule.clauses {
        let kind = match clause.kind {
            RuleClauseKind::Forbid => "forbid",
            RuleClauseKind::Require => "require",
        };
        out.push_str(&format!("{}{kind} if {}", indent_str(1), print_expr(&clause.condition)));
        if let Some(emit) = &clause.emit {
            out.push_str(&format!(" emit {emit}"));
        }
        out.push('\n');
    }
    out.push_str("}\n");
    out
}

fn print_access(access: &AccessDecl) -> String {
    let mut out = format!("access {} {{\n", access.entity);
    if let Some(read) = &access.read {
        out.push_str(&format!("{}read: {}\n", indent_str(1), print_expr(read)));
    }
    if let Some(write) = &access.write {
        out.push_str(&format!("{}write: {}\n", indent_str(1), print_expr(write)));
    }
    out.push_str("}\n");
    out
}

fn print_message(message: &MessageDecl) -> String {
    format!(
        "message {} {{\n{}severity: {}\n{}text: \"{}\"\n}}\n",
        message.code,
        indent_str(1),
        message.severity,
        indent_str(1),
        escape_string(&message.text)
    )
}

fn print_job(job: &JobDecl) -> String {
    let mut out = format!("job {} {{\n", job.name);
    out.push_str(&format!("{}input: {}\n", indent_str(1), job.input_entity));
    if let Some(needs) = &job.needs {
        out.push_str(&format!("{}needs: {}", indent_str(1), needs.path.as_str()));
        if let Some(where_expr) = &needs.where_expr {
            out.push_str(&format!(" where {}", print_expr(where_expr)));
        }
        out.push('\n');
    }
    out.push_str(&format!("{}effect: {}\n", indent_str(1), job.effect.as_str()));
    if let Some(creates) = &job.creates {
        out.push_str(&format!("{}create: {} {{\n", indent_str(1), creates.target_entity));
        for (key, value) in &creates.mappings {
            out.push_str(&format!("{}{key}: {}\n", indent_str(2), print_expr(value)));
        }
        out.push_str(&format!("{}}}\n", indent_str(1)));
    }
    out.push_str("}\n");
    out
}

fn print_hook(hook: &HookDecl) -> String {
    format!(
        "hook {}.{}_{} {{\n{}emit: {}\n}}\n",
        hook.target_entity,
        hook.timing,
        hook.operation,
        indent_str(1),
        hook.enqueue.join(", ")
    )
}

fn print_view(view: &ViewDecl) -> String {
    let mut out = format!("view {} {{\n", view.name);
    out.push_str(&format!("{}source: {}\n", indent_str(1), view.source));
    let fields: Vec<String> = view.fields.iter().map(|p| p.as_str()).collect();
    out.push_str(&format!("{}fields: {}\n", indent_str(1), fields.join(", ")));
    if let Some(filter) = &view.filter {
        out.push_str(&format!("{}where: {}\n", indent_str(1), print_expr(filter)));
    }
    if !view.sort.is_empty() {
        let sort: Vec<String> = view
            .sort
            .iter()
            .map(|s| {
                if s.descending {
                    format!("-{}", s.path.as_str())
                } else {
                    s.path.as_str()
                }
            })
            .collect();
        out.push_str(&format!("{}sort: {}\n", indent_str(1), sort.join(", ")));
    }
    out.push_str("}\n");
    out
}

fn print_webhook(webhook: &WebhookDecl) -> String {
    format!(
        "webhook {} {{\n{}provider: {}\n{}events: {}\n{}action: {}\n}}\n",
        webhook.name,
        indent_str(1),
        webhook.provider,
        indent_str(1),
        webhook.events.join(", "),
        indent_str(1),
        webhook.action,
    )
}

fn print_imperative(imperative: &ImperativeDecl) -> String {
    format!(
        "imperative {} {{\n{}input: {}\n{}returns: {}\n}}\n",
        imperative.name,
        indent_str(1),
        imperative.input_entity,
        indent_str(1),
        imperative.returns,
    )
}

fn print_migrate(migrate: &MigrateDecl) -> String {
    let mut out = format!("migrate {}.{} {{\n", migrate.entity, migrate.version);
    out.push_str(&format!(
        "{}from: {}\n",
        indent_str(1),
        print_type_expr(&migrate.from_type)
    ));
    out.push_str(&format!("{}to: {}\n", indent_str(1), print_type_expr(&migrate.to_type)));
    if !migrate.mappings.is_empty() {
        let mappings: Vec<String> = migrate
            .mappings
            .iter()
            .map(|(from, to)| format!("{} -> {}", print_expr(from), print_expr(to)))
            .collect();
        out.push_str(&format!("{}map: {}\n", indent_str(1), mappings.join(", ")));
    }
    out.push_str("}\n");
    out
}

fn print_test(test: &TestDecl) -> String {
    let mut out = format!("test {} {{\n", test.target.as_str());
    for (path, value) in &test.given {
        out.push_str(&format!(
            "{}given {}: {}\n",
            indent_str(1),
            path.as_str(),
            print_expr(value)
        ));
    }
    out.push_str(&format!(
        "{}when {}: {}\n",
        indent_str(1),
        test.when.operation,
        test.when.target.as_str()
    ));
    match &test.expect {
        ExpectClause::Reject { message, .. } => {
            out.push_str(&format!("{}expect reject {message}\n", indent_str(1)));
        }
        ExpectClause::PathEq { path, value, .. } => {
            out.push_str(&format!(
                "{}expect {} = {}\n",
                indent_str(1),
                path.as_str(),
                print_expr(value)
            ));
        }
    }
    out.push_str("}\n");
    out
}

/// Render an expression back to FORGE surface syntax. Grouped sub-expressions
/// keep their explicit parentheses; everything else is printed without extra
/// parenthesization (the parser's precedence climbing is faithful to this
/// canonical spacing on re-parse).
fn print_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Path(parts) => parts.join("."),
        ExprKind::Int(n) => n.to_string(),
        ExprKind::Float(f) => f.to_string(),
        ExprKind::Str(s) => format!("\"{}\"", escape_string(s)),
        ExprKind::Bool(b) => b.to_string(),
        ExprKind::Unary { op, operand } => match op {
            UnOp::Neg => format!("-{}", print_expr(operand)),
            UnOp::Not => format!("not {}", print_expr(operand)),
        },
        ExprKind::Binary { left, op, right } => {
            let sym = match op {
                BinOp::Or => "or",
                BinOp::And => "and",
                BinOp::Eq => "==",
                BinOp::Ne => "!=",
                BinOp::Lt => "<",
                BinOp::Gt => ">",
                BinOp::Le => "<=",
                BinOp::Ge => ">=",
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div => "/",
                BinOp::Mod => "%",
            };
            format!("{} {sym} {}", print_expr(left), print_expr(right))
        }
        ExprKind::In { left, right } => format!("{} in {}", print_expr(left), print_expr(right)),
        ExprKind::Call { callee, args } => {
            let args_str: Vec<String> = args.iter().map(print_expr).collect();
            format!("{}({})", print_expr(callee), args_str.join(", "))
        }
        ExprKind::Grouped(inner) => format!("({})", print_expr(inner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn entity_round_trips_declaration_count() {
        let src = r#"
            entity Ticket { subject: string status: enum(open, closed) = open }
            relation Ticket.author -> User
        "#;
        let (file, diags) = parse(src, "t.forge");
        assert!(!diags.has_errors());
        let printed = print_file(&file);
        let (reparsed, diags2) = parse(&printed, "t.forge");
        assert!(!diags2.has_errors(), "{printed}");
        assert_eq!(file.decls.len(), reparsed.decls.len());
    }

    #[test]
    fn expression_precedence_survives_print_and_reparse() {
        let src = "rule Ticket.update { forbid if a or b and c == d }";
        let (file, _) = parse(src, "t.forge");
        let printed = print_file(&file);
        let (reparsed, diags) = parse(&printed, "t.forge");
        assert!(!diags.has_errors());
        assert_eq!(file, reparsed);
    }
}
