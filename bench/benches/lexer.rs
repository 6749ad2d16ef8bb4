use acorn::{lexer, token::TokenKind};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/main.acorn");

fn lexer(input: &str, tokens: &mut Vec<acorn::token::Token>) {
    lexer::lex(input, 0, tokens);
    let valid = tokens
        .iter()
        .filter(|token| !matches!(token.kind, TokenKind::Error(_)))
        .count();
    black_box(valid);
}

fn criterion_benchmark(c: &mut Criterion) {
    let input = INPUT.repeat(64);
    let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY * 2);

    c.bench_function("lexer", |b| {
        b.iter(|| {
            tokens.clear();
            lexer(black_box(&input), &mut tokens);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
