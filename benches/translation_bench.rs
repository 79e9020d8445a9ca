use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spirvgen::parser::{
    Attribute, BinaryOp, Expression, FunctionDecl, IfPart, Module, SourceLocation, Statement,
    StructDecl, TypeRef,
};
use spirvgen::{CompileOptions, Compiler};

fn x() -> Expression {
    Expression::local("x", TypeRef::Float)
}

/// `Main` with `depth` nested loops, each updating `x` under a branch
fn shader(name: &str, depth: usize) -> StructDecl {
    let mut body = vec![Statement::Break {
        location: SourceLocation::default(),
    }];
    for i in 0..depth {
        let update = Statement::Expression(Expression::assign(
            x(),
            Expression::binary(
                BinaryOp::Mul,
                Expression::binary(BinaryOp::Add, x(), Expression::float(i as f32), TypeRef::Float),
                Expression::float(0.5),
                TypeRef::Float,
            ),
        ));
        body = vec![
            Statement::If {
                parts: vec![IfPart {
                    condition: Some(Expression::binary(
                        BinaryOp::Gt,
                        x(),
                        Expression::float(1.0),
                        TypeRef::Bool,
                    )),
                    body: vec![update],
                }],
            },
            Statement::Loop { body },
            Statement::Break {
                location: SourceLocation::default(),
            },
        ];
    }
    body.pop();
    body.insert(
        0,
        Statement::VarDecl {
            name: "x".into(),
            ty: TypeRef::Float,
            initializer: Some(Expression::float(3.0)),
            location: SourceLocation::default(),
        },
    );
    body.push(Statement::Return {
        value: None,
        location: SourceLocation::default(),
    });
    StructDecl {
        name: name.into(),
        attributes: vec![Attribute::new("Pixel")],
        functions: vec![FunctionDecl {
            name: "Main".into(),
            params: vec![],
            return_type: TypeRef::Void,
            is_static: true,
            attributes: vec![],
            body,
            location: SourceLocation::default(),
        }],
        ..Default::default()
    }
}

fn translation_benchmark(c: &mut Criterion) {
    let module = Module {
        structs: vec![shader("Deep", 16)],
        enums: vec![],
    };
    let compiler = Compiler::new(CompileOptions::default());

    c.bench_function("translate nested loops", |b| {
        b.iter(|| compiler.translate(black_box(&module)).unwrap())
    });

    c.bench_function("compile nested loops", |b| {
        b.iter(|| compiler.compile(black_box(&module)).unwrap())
    });
}

fn emission_benchmark(c: &mut Criterion) {
    let module = Module {
        structs: (0..8).map(|i| shader(&format!("Stage{}", i), 8)).collect(),
        enums: vec![],
    };
    let parallel = Compiler::new(CompileOptions::default());
    let serial = Compiler::new(CompileOptions {
        parallel_emit: false,
        ..CompileOptions::default()
    });

    c.bench_function("compile 8 entry points (parallel)", |b| {
        b.iter(|| parallel.compile(black_box(&module)).unwrap())
    });
    c.bench_function("compile 8 entry points (serial)", |b| {
        b.iter(|| serial.compile(black_box(&module)).unwrap())
    });
}

criterion_group!(benches, translation_benchmark, emission_benchmark);
criterion_main!(benches);
