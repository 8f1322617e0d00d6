use super::*;
use crate::frontend::ast::{
    AssignOp, BinaryOp, Decl, Expr, Program, QueryClause, Stmt, TypeRef, UnaryOp,
};

fn parse_clean(source: &str) -> Program {
    let outcome = parse(source).expect("parse aborted");
    assert!(
        outcome.is_clean(),
        "unexpected errors: {:?}",
        outcome.errors
    );
    outcome.program
}

fn single_stmt(program: &Program) -> &Stmt {
    assert_eq!(program.body.len(), 1, "expected one declaration");
    match &program.body[0].node {
        Decl::Statement(stmt) => &stmt.node,
        other => panic!("expected a statement, got {:?}", other),
    }
}

fn body_of<'a>(program: &'a Program, index: usize) -> &'a [Located<Stmt>] {
    match &program.body[index].node {
        Decl::Function(f) | Decl::Sub(f) => &f.body.as_ref().unwrap().statements,
        other => panic!("expected a callable, got {:?}", other),
    }
}

fn assigned_value(program: &Program) -> &Expr {
    match single_stmt(program) {
        Stmt::Assign(assign) => &assign.value.node,
        other => panic!("expected an assignment, got {:?}", other),
    }
}

// ===== declarations =====

#[test]
fn test_function_declaration() {
    let program = parse_clean(
        "Function Add(a As Integer, b As Integer) As Integer
            Return a + b
        End Function
        ",
    );
    let func = match &program.body[0].node {
        Decl::Function(f) => f,
        other => panic!("expected a Function, got {:?}", other),
    };
    assert_eq!(func.name, "Add");
    assert_eq!(func.params.len(), 2);
    assert_eq!(func.params[0].name, "a");
    assert!(matches!(
        func.return_type.as_ref().map(|t| &t.node),
        Some(TypeRef::Named(name)) if name == "Integer"
    ));
    let body = func.body.as_ref().expect("function body");
    assert!(matches!(body.statements[0].node, Stmt::Return(Some(_))));
}

#[test]
fn test_sub_rejects_return_type() {
    let outcome = parse(
        "Sub Greet() As Integer
        End Sub
        ",
    )
    .expect("parse aborted");
    assert_eq!(outcome.errors.len(), 1, "errors: {:?}", outcome.errors);
    assert!(
        outcome.errors[0]
            .message
            .contains("A Sub does not declare a return type")
    );
    // The Sub itself survives.
    assert!(matches!(outcome.program.body[0].node, Decl::Sub(_)));
}

#[test]
fn test_class_header_clauses() {
    let program = parse_clean(
        "Class Dog
            Inherits Animal
            Implements Walker, Barker

            Sub Speak()
                Print(\"Woof\")
            End Sub
        End Class
        ",
    );
    let class = match &program.body[0].node {
        Decl::Class(c) => c,
        other => panic!("expected a Class, got {:?}", other),
    };
    assert_eq!(class.name, "Dog");
    assert!(matches!(
        class.inherits.as_ref().map(|t| &t.node),
        Some(TypeRef::Named(name)) if name == "Animal"
    ));
    assert_eq!(class.implements.len(), 2);
    assert_eq!(class.members.len(), 1);
}

#[test]
fn test_duplicate_inherits_is_an_error() {
    let outcome = parse(
        "Class Dog
            Inherits Animal
            Inherits Pet
        End Class
        ",
    )
    .expect("parse aborted");
    assert!(
        outcome
            .errors
            .iter()
            .any(|e| e.message.contains("only one 'Inherits'"))
    );
}

#[test]
fn test_generic_class_and_type_params() {
    let program = parse_clean(
        "Class Pair(Of A, B)
            Dim first As A
            Dim second As B
        End Class
        ",
    );
    let class = match &program.body[0].node {
        Decl::Class(c) => c,
        other => panic!("expected a Class, got {:?}", other),
    };
    assert_eq!(class.type_params, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(class.members.len(), 2);
}

#[test]
fn test_interface_rejects_fields() {
    let outcome = parse(
        "Interface Walker
            Sub Walk()
            Dim speed As Integer
        End Interface
        ",
    )
    .expect("parse aborted");
    assert_eq!(outcome.errors.len(), 1);
    assert!(
        outcome.errors[0]
            .message
            .contains("Only Function and Sub signatures")
    );
    // The good member survives.
    match &outcome.program.body[0].node {
        Decl::Interface(i) => assert_eq!(i.members.len(), 1),
        other => panic!("expected an Interface, got {:?}", other),
    }
}

#[test]
fn test_enum_variants_with_values() {
    let program = parse_clean(
        "Enum Color
            Red
            Green = 5
            Blue = -1
        End Enum
        ",
    );
    let decl = match &program.body[0].node {
        Decl::Enum(e) => e,
        other => panic!("expected an Enum, got {:?}", other),
    };
    assert_eq!(decl.variants.len(), 3);
    assert_eq!(decl.variants[0].value, None);
    assert_eq!(decl.variants[1].value, Some(5));
    assert_eq!(decl.variants[2].value, Some(-1));
}

#[test]
fn test_optional_parameter_requires_default() {
    let outcome = parse(
        "Sub Log(Optional level As Integer)
        End Sub
        ",
    )
    .expect("parse aborted");
    assert_eq!(outcome.errors.len(), 1, "errors: {:?}", outcome.errors);
    assert!(outcome.errors[0].message.contains("must have a default value"));
}

// ===== statements =====

#[test]
fn test_statement_head_equals_is_assignment() {
    let program = parse_clean("x = 1\n");
    match single_stmt(&program) {
        Stmt::Assign(assign) => {
            assert_eq!(assign.op, AssignOp::Set);
            assert!(matches!(&assign.target.node, Expr::Identifier(name) if name == "x"));
        }
        other => panic!("expected an assignment, got {:?}", other),
    }

    // Only the first `=` is the assignment; the rest is equality.
    let program = parse_clean("y = a = b\n");
    assert!(matches!(
        assigned_value(&program),
        Expr::Binary(bin) if bin.op == BinaryOp::Eq
    ));
}

#[test]
fn test_equality_restored_inside_arguments() {
    let program = parse_clean("Print(a = b)\n");
    match single_stmt(&program) {
        Stmt::Expression(expr) => {
            let call = match &expr.node {
                Expr::Call(call) => call,
                other => panic!("expected a call, got {:?}", other),
            };
            assert!(matches!(
                &call.args[0].node,
                Expr::Binary(bin) if bin.op == BinaryOp::Eq
            ));
        }
        other => panic!("expected an expression statement, got {:?}", other),
    }
}

#[test]
fn test_compound_assignment_operators() {
    let program = parse_clean("x += 2\ns &= \"!\"\n");
    let ops: Vec<AssignOp> = program
        .body
        .iter()
        .map(|decl| match &decl.node {
            Decl::Statement(stmt) => match &stmt.node {
                Stmt::Assign(assign) => assign.op,
                other => panic!("expected an assignment, got {:?}", other),
            },
            other => panic!("expected a statement, got {:?}", other),
        })
        .collect();
    assert_eq!(ops, vec![AssignOp::Add, AssignOp::Concat]);
}

#[test]
fn test_invalid_assignment_target() {
    let outcome = parse("1 = 2\n").expect("parse aborted");
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].message.contains("Invalid assignment target"));
}

#[test]
fn test_select_case() {
    let program = parse_clean(
        "Sub Main()
            Select Case n
                Case 1, 2
                    Print(\"low\")
                Case 3
                    Print(\"mid\")
                Case Else
                    Print(\"high\")
            End Select
        End Sub
        ",
    );
    let body = body_of(&program, 0);
    let select = match &body[0].node {
        Stmt::Select(s) => s,
        other => panic!("expected Select, got {:?}", other),
    };
    assert_eq!(select.cases.len(), 2);
    assert_eq!(select.cases[0].labels.len(), 2);
    assert!(select.else_block.is_some());
}

#[test]
fn test_for_loops() {
    let program = parse_clean(
        "Sub Main()
            For i = 1 To 10 Step 2
                Print(i)
            Next i
            For Each item In things
                Print(item)
            Next
        End Sub
        ",
    );
    let body = body_of(&program, 0);
    match &body[0].node {
        Stmt::For(f) => {
            assert_eq!(f.var, "i");
            assert!(f.step.is_some());
        }
        other => panic!("expected For, got {:?}", other),
    }
    match &body[1].node {
        Stmt::ForEach(f) => {
            assert_eq!(f.var, "item");
            assert!(f.var_ty.is_none());
        }
        other => panic!("expected For Each, got {:?}", other),
    }
}

#[test]
fn test_next_variable_mismatch() {
    let outcome = parse(
        "Sub Main()
            For i = 1 To 3
                Print(i)
            Next j
        End Sub
        ",
    )
    .expect("parse aborted");
    assert_eq!(outcome.errors.len(), 1, "errors: {:?}", outcome.errors);
    assert!(
        outcome.errors[0]
            .message
            .contains("does not match the loop variable")
    );
}

#[test]
fn test_do_loop_variants() {
    let program = parse_clean(
        "Sub Main()
            Do While a
                Print(1)
            Loop
            Do
                Print(2)
            Loop Until b
        End Sub
        ",
    );
    let body = body_of(&program, 0);
    match &body[0].node {
        Stmt::DoLoop(d) => {
            assert!(d.cond.is_some());
            assert!(!d.until);
            assert!(!d.post_test);
        }
        other => panic!("expected Do loop, got {:?}", other),
    }
    match &body[1].node {
        Stmt::DoLoop(d) => {
            assert!(d.cond.is_some());
            assert!(d.until);
            assert!(d.post_test);
        }
        other => panic!("expected Do loop, got {:?}", other),
    }
}

#[test]
fn test_do_loop_condition_on_both_ends_is_an_error() {
    let outcome = parse(
        "Sub Main()
            Do While a
                Print(1)
            Loop Until b
        End Sub
        ",
    )
    .expect("parse aborted");
    assert_eq!(outcome.errors.len(), 1, "errors: {:?}", outcome.errors);
    assert!(outcome.errors[0].message.contains("'Do' or 'Loop', not both"));
}

#[test]
fn test_try_catch_finally() {
    let program = parse_clean(
        "Sub Main()
            Try
                risky()
            Catch e As Failure
                Print(e)
            Finally
                cleanup()
            End Try
        End Sub
        ",
    );
    let body = body_of(&program, 0);
    let stmt = match &body[0].node {
        Stmt::Try(t) => t,
        other => panic!("expected Try, got {:?}", other),
    };
    assert_eq!(stmt.catches.len(), 1);
    assert_eq!(stmt.catches[0].var.as_deref(), Some("e"));
    assert!(stmt.catches[0].ty.is_some());
    assert!(stmt.finally.is_some());
}

#[test]
fn test_try_requires_catch_or_finally() {
    let outcome = parse(
        "Sub Main()
            Try
                Print(1)
            End Try
        End Sub
        ",
    )
    .expect("parse aborted");
    assert_eq!(outcome.errors.len(), 1, "errors: {:?}", outcome.errors);
    assert!(outcome.errors[0].message.contains("at least one 'Catch'"));
    // The surrounding Sub still parses.
    assert!(matches!(outcome.program.body[0].node, Decl::Sub(_)));
}

#[test]
fn test_with_leading_dot_member() {
    let program = parse_clean(
        "Sub Main()
            With config
                .Name = \"basil\"
            End With
        End Sub
        ",
    );
    let body = body_of(&program, 0);
    let with = match &body[0].node {
        Stmt::With(w) => w,
        other => panic!("expected With, got {:?}", other),
    };
    match &with.body.statements[0].node {
        Stmt::Assign(assign) => match &assign.target.node {
            Expr::Member(member) => {
                assert!(member.target.is_none());
                assert_eq!(member.member, "Name");
            }
            other => panic!("expected a member target, got {:?}", other),
        },
        other => panic!("expected an assignment, got {:?}", other),
    }
}

#[test]
fn test_statement_end_required() {
    let outcome = parse("Print(1) Print(2)\n").expect("parse aborted");
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].message.contains("Expected end of line"));
    assert_eq!(
        outcome.errors[0].suggestion.as_deref(),
        Some("Split the extra tokens onto their own line")
    );
}

// ===== expressions =====

#[test]
fn test_operator_precedence() {
    let program = parse_clean("x = 1 + 2 * 3\n");
    let add = match assigned_value(&program) {
        Expr::Binary(bin) => bin,
        other => panic!("expected a binary expression, got {:?}", other),
    };
    assert_eq!(add.op, BinaryOp::Add);
    assert!(matches!(
        &add.right.node,
        Expr::Binary(bin) if bin.op == BinaryOp::Mul
    ));

    // `&` binds looser than `+`.
    let program = parse_clean("x = a & b + c\n");
    assert!(matches!(
        assigned_value(&program),
        Expr::Binary(bin) if bin.op == BinaryOp::Concat
    ));

    // `Mod` binds tighter than `+`, looser than `*`.
    let program = parse_clean("x = a + b Mod c\n");
    let add = match assigned_value(&program) {
        Expr::Binary(bin) => bin,
        other => panic!("expected a binary expression, got {:?}", other),
    };
    assert_eq!(add.op, BinaryOp::Add);
    assert!(matches!(
        &add.right.node,
        Expr::Binary(bin) if bin.op == BinaryOp::Mod
    ));
}

#[test]
fn test_not_and_unary_minus() {
    let program = parse_clean("x = Not a And b\n");
    let and = match assigned_value(&program) {
        Expr::Binary(bin) => bin,
        other => panic!("expected a binary expression, got {:?}", other),
    };
    assert_eq!(and.op, BinaryOp::And);
    assert!(matches!(
        &and.left.node,
        Expr::Unary(u) if u.op == UnaryOp::Not
    ));

    let program = parse_clean("x = -a * b\n");
    let mul = match assigned_value(&program) {
        Expr::Binary(bin) => bin,
        other => panic!("expected a binary expression, got {:?}", other),
    };
    assert_eq!(mul.op, BinaryOp::Mul);
    assert!(matches!(
        &mul.left.node,
        Expr::Unary(u) if u.op == UnaryOp::Neg
    ));
}

#[test]
fn test_member_call_index_chain() {
    let program = parse_clean("x = row.cells(1).value[2]\n");
    let index = match assigned_value(&program) {
        Expr::Index(index) => index,
        other => panic!("expected an index, got {:?}", other),
    };
    let member = match &index.target.node {
        Expr::Member(member) => member,
        other => panic!("expected a member, got {:?}", other),
    };
    assert_eq!(member.member, "value");
    assert!(matches!(
        member.target.as_ref().map(|t| &t.node),
        Some(Expr::Call(_))
    ));
}

#[test]
fn test_new_and_ctype() {
    let program = parse_clean("x = New List(Of Integer)\ny = CType(x, Object)\n");
    match &program.body[0].node {
        Decl::Statement(stmt) => match &stmt.node {
            Stmt::Assign(assign) => assert!(matches!(
                &assign.value.node,
                Expr::New(n) if matches!(&n.ty.node, TypeRef::Generic(name, args)
                    if name == "List" && args.len() == 1)
            )),
            other => panic!("expected an assignment, got {:?}", other),
        },
        other => panic!("expected a statement, got {:?}", other),
    }
    match &program.body[1].node {
        Decl::Statement(stmt) => match &stmt.node {
            Stmt::Assign(assign) => assert!(matches!(&assign.value.node, Expr::Cast(_))),
            other => panic!("expected an assignment, got {:?}", other),
        },
        other => panic!("expected a statement, got {:?}", other),
    }
}

#[test]
fn test_query_expression() {
    let program =
        parse_clean("Dim rows = From x In xs Where x > 2 Order By x Descending Select x * 2\n");
    let var = match &program.body[0].node {
        Decl::Variable(v) => v,
        other => panic!("expected a variable, got {:?}", other),
    };
    let query = match var.init.as_ref().map(|e| &e.node) {
        Some(Expr::Query(q)) => q,
        other => panic!("expected a query, got {:?}", other),
    };
    assert_eq!(query.var, "x");
    assert_eq!(query.clauses.len(), 3);
    assert!(matches!(query.clauses[0].node, QueryClause::Where(_)));
    assert!(matches!(
        query.clauses[1].node,
        QueryClause::OrderBy {
            descending: true,
            ..
        }
    ));
    assert!(matches!(query.clauses[2].node, QueryClause::Select(_)));
}

#[test]
fn test_query_join_and_aggregate() {
    let program = parse_clean(
        "Dim rows = From o In orders Join c In customers On o Equals c Into g \
         Aggregate v In vals Into total = v\n",
    );
    let var = match &program.body[0].node {
        Decl::Variable(v) => v,
        other => panic!("expected a variable, got {:?}", other),
    };
    let query = match var.init.as_ref().map(|e| &e.node) {
        Some(Expr::Query(q)) => q,
        other => panic!("expected a query, got {:?}", other),
    };
    assert!(matches!(
        &query.clauses[0].node,
        QueryClause::Join { group: Some(g), .. } if g == "g"
    ));
    assert!(matches!(
        &query.clauses[1].node,
        QueryClause::Aggregate { result, .. } if result == "total"
    ));
}

// ===== type references =====

#[test]
fn test_type_reference_suffixes() {
    let program = parse_clean(
        "Dim a As Integer[10]
        Dim b As List(Of Integer)?
        Dim p As Integer Ptr
        Dim m As Double[,]
        ",
    );
    let ty_of = |index: usize| match &program.body[index].node {
        Decl::Variable(v) => &v.ty.as_ref().unwrap().node,
        other => panic!("expected a variable, got {:?}", other),
    };
    assert!(matches!(
        ty_of(0),
        TypeRef::Array {
            rank: 1,
            size: Some(10),
            ..
        }
    ));
    assert!(matches!(ty_of(1), TypeRef::Nullable(inner)
        if matches!(&inner.node, TypeRef::Generic(name, _) if name == "List")));
    assert!(matches!(ty_of(2), TypeRef::Pointer(_)));
    assert!(matches!(
        ty_of(3),
        TypeRef::Array {
            rank: 2,
            size: None,
            ..
        }
    ));
}

// ===== error recovery =====

#[test]
fn test_missing_then_recovers_with_one_error() {
    let outcome = parse(
        "Function Main() As Integer
            If ready
                Print(1)
            End If
            Return 0
        End Function

        Sub After()
        End Sub
        ",
    )
    .expect("parse aborted");

    assert_eq!(outcome.errors.len(), 1, "errors: {:?}", outcome.errors);
    let error = &outcome.errors[0];
    assert!(error.message.contains("Expected 'Then'"));
    let context = error.context.as_deref().expect("context snapshot");
    assert!(context.contains("If statement"));
    assert!(context.contains("Function 'Main'"));
    assert_eq!(
        error.suggestion.as_deref(),
        Some("Add 'Then' after the condition")
    );

    // The If body and everything after it still parsed.
    assert_eq!(outcome.program.body.len(), 2);
    let main_body = body_of(&outcome.program, 0);
    assert!(matches!(main_body[0].node, Stmt::If(_)));
    assert!(matches!(main_body[1].node, Stmt::Return(Some(_))));
    assert!(matches!(outcome.program.body[1].node, Decl::Sub(_)));
}

#[test]
fn test_context_labels_nest_innermost_first() {
    let outcome = parse(
        "Class Outer
            Function Inner() As Integer
                If flag
                    Return 1
                End If
                Return 0
            End Function
        End Class
        ",
    )
    .expect("parse aborted");
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(
        outcome.errors[0].context.as_deref(),
        Some("If statement, in Function 'Inner', in Class 'Outer'")
    );
}

#[test]
fn test_cascading_errors_are_suppressed() {
    // One broken line, one error; panic mode swallows the follow-on noise.
    let outcome = parse(
        "Sub Main()
            Dim = = 5
        End Sub
        ",
    )
    .expect("parse aborted");
    assert_eq!(outcome.errors.len(), 1, "errors: {:?}", outcome.errors);
}

#[test]
fn test_block_recovery_collects_distinct_errors() {
    let outcome = parse(
        "Sub Main()
            Dim = 5
            Print(1)
            Dim y As = 2
        End Sub
        ",
    )
    .expect("parse aborted");
    assert_eq!(outcome.errors.len(), 2, "errors: {:?}", outcome.errors);
    assert!(outcome.errors[0].message.contains("variable name"));
    assert!(outcome.errors[1].message.contains("type name"));
    // The healthy statement between the two bad ones survived.
    let body = body_of(&outcome.program, 0);
    assert_eq!(body.len(), 1);
    assert!(matches!(body[0].node, Stmt::Expression(_)));
}

#[test]
fn test_parse_is_deterministic() {
    let source = "Sub Main()
        Dim = 5
        If x
            Print(
        End If
    End Sub
    ";
    let first = parse(source).expect("parse aborted");
    let second = parse(source).expect("parse aborted");
    assert_eq!(first.errors, second.errors);
    assert!(!first.errors.is_empty());
}

#[test]
fn test_error_cap_aborts_the_parse() {
    let source = ")\n".repeat(150);
    match parse(&source) {
        Err(FatalParseError::TooManyErrors { errors }) => {
            assert_eq!(errors.len(), MAX_PARSE_ERRORS);
        }
        Ok(outcome) => panic!("expected a fatal abort, got {} errors", outcome.errors.len()),
    }
}

#[test]
fn test_lex_errors_flow_into_the_outcome() {
    let outcome = parse("Dim x = 5 ~\n").expect("parse aborted");
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].message.contains("character"));
    // The declaration before the stray character still parsed.
    assert!(matches!(outcome.program.body[0].node, Decl::Variable(_)));
}
