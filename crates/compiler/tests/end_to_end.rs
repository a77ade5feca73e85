//! End-to-end tests: compile an AST, execute it, check the output.

use kronos_compiler::ast::{BinOpKind, Expr, ForKind, Stmt};
use kronos_compiler::{compile, CompileError};
use kronos_vm::{Interpreter, Runtime, VmError};

fn run_program(program: &[Stmt]) -> String {
    let runtime = Runtime::new();
    let bytecode = compile(&runtime, program).expect("compilation succeeds");
    let mut interpreter = Interpreter::new(runtime);
    interpreter.capture_output();
    interpreter.run(&bytecode).expect("execution succeeds");
    assert_eq!(interpreter.operand_stack_len(), 0, "stack must be balanced");
    assert_eq!(interpreter.scope_depth(), 1, "only the global scope remains");
    interpreter.take_output()
}

fn run_expecting_fault(program: &[Stmt]) -> VmError {
    let runtime = Runtime::new();
    let bytecode = compile(&runtime, program).expect("compilation succeeds");
    let mut interpreter = Interpreter::new(runtime);
    interpreter.capture_output();
    interpreter.run(&bytecode).expect_err("execution faults")
}

fn binop(op: BinOpKind, left: Expr, right: Expr) -> Expr {
    Expr::BinOp {
        op,
        left: Box::new(left),
        right: Some(Box::new(right)),
    }
}

fn assign(name: &str, value: Expr) -> Stmt {
    Stmt::Assign {
        name: name.into(),
        value,
        is_mutable: true,
        type_name: None,
    }
}

/// set x to 21; set y to x plus x; print y  →  42
#[test]
fn arithmetic_through_variables() {
    let program = vec![
        assign("x", Expr::Number(21.0)),
        assign(
            "y",
            binop(BinOpKind::Add, Expr::Var("x".into()), Expr::Var("x".into())),
        ),
        Stmt::Print(Expr::Var("y".into())),
    ];
    assert_eq!(run_program(&program), "42\n");
}

/// let i to 0; while i is less than 3: print i; set i to i plus 1
#[test]
fn while_loop_counts() {
    let program = vec![
        assign("i", Expr::Number(0.0)),
        Stmt::While {
            condition: binop(BinOpKind::Lt, Expr::Var("i".into()), Expr::Number(3.0)),
            block: vec![
                Stmt::Print(Expr::Var("i".into())),
                assign(
                    "i",
                    binop(BinOpKind::Add, Expr::Var("i".into()), Expr::Number(1.0)),
                ),
            ],
        },
    ];
    assert_eq!(run_program(&program), "0\n1\n2\n");
}

/// function square with n: return n times n; print call square with 5
#[test]
fn function_definition_and_call() {
    let program = vec![
        Stmt::Function {
            name: "square".into(),
            params: vec!["n".into()],
            block: vec![Stmt::Return(Some(binop(
                BinOpKind::Mul,
                Expr::Var("n".into()),
                Expr::Var("n".into()),
            )))],
        },
        Stmt::Print(Expr::Call {
            name: "square".into(),
            args: vec![Expr::Number(5.0)],
        }),
    ];
    assert_eq!(run_program(&program), "25\n");
}

/// set xs to list 1, 2, 3; for v in xs: print v
#[test]
fn for_over_list() {
    let program = vec![
        assign(
            "xs",
            Expr::List(vec![Expr::Number(1.0), Expr::Number(2.0), Expr::Number(3.0)]),
        ),
        Stmt::For {
            var: "v".into(),
            kind: ForKind::Iterable(Expr::Var("xs".into())),
            block: vec![Stmt::Print(Expr::Var("v".into()))],
        },
    ];
    assert_eq!(run_program(&program), "1\n2\n3\n");
}

/// set name to "world"; print f"hello {name}!"
#[test]
fn fstring_interpolation() {
    let program = vec![
        assign("name", Expr::Str("world".into())),
        Stmt::Print(Expr::FString(vec![
            Expr::Str("hello ".into()),
            Expr::Var("name".into()),
            Expr::Str("!".into()),
        ])),
    ];
    assert_eq!(run_program(&program), "hello world!\n");
}

/// An f-string that opens with an expression part seeds from the empty
/// string.
#[test]
fn fstring_leading_expression() {
    let program = vec![
        assign("n", Expr::Number(7.0)),
        Stmt::Print(Expr::FString(vec![
            Expr::Var("n".into()),
            Expr::Str(" wonders".into()),
        ])),
    ];
    assert_eq!(run_program(&program), "7 wonders\n");
}

#[test]
fn for_over_range_form() {
    let program = vec![Stmt::For {
        var: "i".into(),
        kind: ForKind::Range {
            start: Expr::Number(1.0),
            end: Expr::Number(4.0),
        },
        block: vec![Stmt::Print(Expr::Var("i".into()))],
    }];
    assert_eq!(run_program(&program), "1\n2\n3\n4\n");
}

#[test]
fn nested_for_loops_use_distinct_iterator_slots() {
    let program = vec![
        assign("xs", Expr::List(vec![Expr::Number(1.0), Expr::Number(2.0)])),
        assign(
            "ys",
            Expr::List(vec![Expr::Number(10.0), Expr::Number(20.0)]),
        ),
        Stmt::For {
            var: "a".into(),
            kind: ForKind::Iterable(Expr::Var("xs".into())),
            block: vec![Stmt::For {
                var: "b".into(),
                kind: ForKind::Iterable(Expr::Var("ys".into())),
                block: vec![Stmt::Print(binop(
                    BinOpKind::Add,
                    Expr::Var("a".into()),
                    Expr::Var("b".into()),
                ))],
            }],
        },
    ];
    assert_eq!(run_program(&program), "11\n21\n12\n22\n");
}

#[test]
fn if_else_if_else_chain() {
    fn classify(n: f64) -> Vec<Stmt> {
        vec![
            assign("n", Expr::Number(n)),
            Stmt::If {
                condition: binop(BinOpKind::Lt, Expr::Var("n".into()), Expr::Number(0.0)),
                block: vec![Stmt::Print(Expr::Str("negative".into()))],
                else_if_conditions: vec![binop(
                    BinOpKind::Eq,
                    Expr::Var("n".into()),
                    Expr::Number(0.0),
                )],
                else_if_blocks: vec![vec![Stmt::Print(Expr::Str("zero".into()))]],
                else_block: Some(vec![Stmt::Print(Expr::Str("positive".into()))]),
            },
        ]
    }
    assert_eq!(run_program(&classify(-1.0)), "negative\n");
    assert_eq!(run_program(&classify(0.0)), "zero\n");
    assert_eq!(run_program(&classify(3.0)), "positive\n");
}

#[test]
fn indexing_and_slicing() {
    let program = vec![
        assign(
            "xs",
            Expr::List(vec![
                Expr::Number(10.0),
                Expr::Number(20.0),
                Expr::Number(30.0),
                Expr::Number(40.0),
            ]),
        ),
        // Negative index counts from the end.
        Stmt::Print(Expr::Index {
            base: Box::new(Expr::Var("xs".into())),
            index: Box::new(binop(BinOpKind::Sub, Expr::Number(0.0), Expr::Number(1.0))),
        }),
        // Implicit slice end: through the end.
        Stmt::Print(Expr::Call {
            name: "len".into(),
            args: vec![Expr::Slice {
                base: Box::new(Expr::Var("xs".into())),
                start: Box::new(Expr::Number(2.0)),
                end: None,
            }],
        }),
        // start > end yields an empty sequence.
        Stmt::Print(Expr::Call {
            name: "len".into(),
            args: vec![Expr::Slice {
                base: Box::new(Expr::Var("xs".into())),
                start: Box::new(Expr::Number(3.0)),
                end: Some(Box::new(Expr::Number(1.0))),
            }],
        }),
    ];
    assert_eq!(run_program(&program), "40\n2\n0\n");
}

#[test]
fn map_literal_roundtrip() {
    let program = vec![
        assign(
            "m",
            Expr::Map {
                keys: vec![Expr::Str("a".into()), Expr::Str("b".into())],
                values: vec![Expr::Number(1.0), Expr::Number(2.0)],
            },
        ),
        Stmt::Print(Expr::Index {
            base: Box::new(Expr::Var("m".into())),
            index: Box::new(Expr::Str("b".into())),
        }),
        Stmt::Print(Expr::Call {
            name: "len".into(),
            args: vec![Expr::Var("m".into())],
        }),
    ];
    assert_eq!(run_program(&program), "2\n2\n");
}

#[test]
fn unary_and_mod_lowering() {
    let program = vec![
        Stmt::Print(Expr::BinOp {
            op: BinOpKind::Neg,
            left: Box::new(Expr::Number(5.0)),
            right: None,
        }),
        Stmt::Print(Expr::BinOp {
            op: BinOpKind::Not,
            left: Box::new(Expr::Bool(false)),
            right: None,
        }),
        Stmt::Print(binop(BinOpKind::Mod, Expr::Number(7.0), Expr::Number(3.0))),
    ];
    assert_eq!(run_program(&program), "-5\ntrue\n1\n");
}

#[test]
fn mixed_addition_coerces_via_to_string() {
    let program = vec![
        Stmt::Print(binop(
            BinOpKind::Add,
            Expr::Str("count: ".into()),
            Expr::Number(3.0),
        )),
        Stmt::Print(binop(
            BinOpKind::Add,
            Expr::Number(3.0),
            Expr::Str(" items".into()),
        )),
    ];
    assert_eq!(run_program(&program), "count: 3\n3 items\n");
}

#[test]
fn call_statement_discards_result() {
    // Uniform policy: a top-level call never prints its result.
    let program = vec![
        Stmt::Call {
            name: "add".into(),
            args: vec![Expr::Number(1.0), Expr::Number(2.0)],
        },
        Stmt::Print(Expr::Str("done".into())),
    ];
    assert_eq!(run_program(&program), "done\n");
}

#[test]
fn recursion_works() {
    // function fact with n: if n is less than 2: return 1
    //                       return n times call fact with n minus 1
    let program = vec![
        Stmt::Function {
            name: "fact".into(),
            params: vec!["n".into()],
            block: vec![
                Stmt::If {
                    condition: binop(BinOpKind::Lt, Expr::Var("n".into()), Expr::Number(2.0)),
                    block: vec![Stmt::Return(Some(Expr::Number(1.0)))],
                    else_if_conditions: vec![],
                    else_if_blocks: vec![],
                    else_block: None,
                },
                Stmt::Return(Some(binop(
                    BinOpKind::Mul,
                    Expr::Var("n".into()),
                    Expr::Call {
                        name: "fact".into(),
                        args: vec![binop(
                            BinOpKind::Sub,
                            Expr::Var("n".into()),
                            Expr::Number(1.0),
                        )],
                    },
                ))),
            ],
        },
        Stmt::Print(Expr::Call {
            name: "fact".into(),
            args: vec![Expr::Number(6.0)],
        }),
    ];
    assert_eq!(run_program(&program), "720\n");
}

#[test]
fn function_without_return_yields_nil() {
    let program = vec![
        Stmt::Function {
            name: "noop".into(),
            params: vec![],
            block: vec![],
        },
        Stmt::Print(Expr::Call {
            name: "noop".into(),
            args: vec![],
        }),
    ];
    assert_eq!(run_program(&program), "nil\n");
}

#[test]
fn type_annotation_enforced_at_runtime() {
    let program = vec![
        Stmt::Assign {
            name: "x".into(),
            value: Expr::Number(1.0),
            is_mutable: true,
            type_name: Some("number".into()),
        },
        assign("x", Expr::Str("oops".into())),
    ];
    let err = run_expecting_fault(&program);
    assert!(matches!(err, VmError::TypeMismatch { .. }));
}

#[test]
fn immutable_rebind_faults() {
    let program = vec![
        Stmt::Assign {
            name: "k".into(),
            value: Expr::Number(1.0),
            is_mutable: false,
            type_name: None,
        },
        assign("k", Expr::Number(2.0)),
    ];
    let err = run_expecting_fault(&program);
    assert!(matches!(err, VmError::ImmutableReassignment { .. }));
}

#[test]
fn division_by_zero_faults() {
    let program = vec![Stmt::Print(binop(
        BinOpKind::Div,
        Expr::Number(1.0),
        Expr::Number(0.0),
    ))];
    let err = run_expecting_fault(&program);
    assert!(matches!(err, VmError::DivisionByZero { .. }));
}

#[test]
fn index_at_length_faults() {
    let program = vec![
        assign("xs", Expr::List(vec![Expr::Number(1.0), Expr::Number(2.0)])),
        Stmt::Print(Expr::Index {
            base: Box::new(Expr::Var("xs".into())),
            index: Box::new(Expr::Number(2.0)),
        }),
    ];
    let err = run_expecting_fault(&program);
    assert!(matches!(err, VmError::IndexOutOfRange { .. }));
}

#[test]
fn raise_statement_faults_with_message() {
    let program = vec![Stmt::Raise(Expr::Str("boom".into()))];
    let err = run_expecting_fault(&program);
    assert_eq!(err, VmError::Raised { message: "boom".into() });
}

#[test]
fn import_emits_no_code_and_dotted_calls_resolve() {
    fn fake_match(rt: &Runtime, _args: &[kronos_vm::Value]) -> kronos_vm::VmResult<kronos_vm::Value> {
        Ok(rt.new_bool(true))
    }

    let runtime = Runtime::new();
    let program = vec![
        Stmt::Import {
            module_name: "regex".into(),
            file_path: None,
        },
        Stmt::Print(Expr::Call {
            name: "regex.match".into(),
            args: vec![Expr::Str("a+".into()), Expr::Str("aaa".into())],
        }),
    ];
    let bytecode = compile(&runtime, &program).unwrap();
    let mut interpreter = Interpreter::new(runtime);
    interpreter.builtins_mut().register("regex.match", fake_match);
    interpreter.capture_output();
    interpreter.run(&bytecode).unwrap();
    assert_eq!(interpreter.take_output(), "true\n");
}

#[test]
fn try_statement_is_a_compile_error() {
    let runtime = Runtime::new();
    let program = vec![Stmt::Try {
        try_block: vec![Stmt::Print(Expr::Number(1.0))],
        catch_blocks: vec![],
        finally_block: None,
    }];
    let err = compile(&runtime, &program).unwrap_err();
    assert!(matches!(err, CompileError::Unsupported { .. }));
}

#[test]
fn constant_pool_overflow_is_detected() {
    // 65 536 distinct number literals overflow the u16-indexed pool.
    let runtime = Runtime::new();
    let mut block = Vec::with_capacity(65_536);
    for i in 0..65_536 {
        block.push(assign("x", Expr::Number(i as f64)));
    }
    let err = compile(&runtime, &block).unwrap_err();
    assert_eq!(err, CompileError::TooManyConstants);
}

#[test]
fn oversized_jump_is_detected() {
    // A single if-body large enough that the exit jump cannot fit a
    // signed 16-bit offset.
    let runtime = Runtime::new();
    let body: Vec<Stmt> = (0..8_192)
        .map(|i| assign("x", Expr::Number(i as f64)))
        .collect();
    let program = vec![Stmt::If {
        condition: Expr::Bool(true),
        block: body,
        else_if_conditions: vec![],
        else_if_blocks: vec![],
        else_block: None,
    }];
    let err = compile(&runtime, &program).unwrap_err();
    assert!(matches!(err, CompileError::JumpOutOfRange { .. }));
}

#[test]
fn whole_program_stack_discipline_with_everything_mixed() {
    let program = vec![
        Stmt::Function {
            name: "sum_list".into(),
            params: vec!["items".into()],
            block: vec![
                assign("total", Expr::Number(0.0)),
                Stmt::For {
                    var: "item".into(),
                    kind: ForKind::Iterable(Expr::Var("items".into())),
                    block: vec![assign(
                        "total",
                        binop(
                            BinOpKind::Add,
                            Expr::Var("total".into()),
                            Expr::Var("item".into()),
                        ),
                    )],
                },
                Stmt::Return(Some(Expr::Var("total".into()))),
            ],
        },
        assign(
            "xs",
            Expr::List(vec![Expr::Number(1.0), Expr::Number(2.0), Expr::Number(3.0)]),
        ),
        Stmt::Print(Expr::FString(vec![
            Expr::Str("sum=".into()),
            Expr::Call {
                name: "sum_list".into(),
                args: vec![Expr::Var("xs".into())],
            },
        ])),
    ];
    assert_eq!(run_program(&program), "sum=6\n");
}
