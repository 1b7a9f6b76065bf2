//! Arithmetic and list builtin tools.

use super::{int_arg, int_list_arg, str_arg};
use crate::types::{Arguments, ParamType, ToolDescriptor};
use anyhow::{anyhow, bail, Result};

/// Tool definitions for the math catalog, in presentation order.
pub fn definitions() -> Vec<ToolDescriptor> {
    let two_ints = |name: &str, description: &str| {
        ToolDescriptor::new(name, description)
            .required("a", ParamType::Integer, "First operand")
            .required("b", ParamType::Integer, "Second operand")
    };
    let one_int = |name: &str, description: &str| {
        ToolDescriptor::new(name, description).required("a", ParamType::Integer, "Operand")
    };

    vec![
        two_ints("add", "Add two numbers"),
        ToolDescriptor::new("add_list", "Add all numbers in a list")
            .required("l", ParamType::IntegerArray, "Numbers to add"),
        two_ints("subtract", "Subtract two numbers"),
        two_ints("multiply", "Multiply two numbers"),
        two_ints("divide", "Divide two numbers"),
        two_ints("power", "Power of two numbers"),
        one_int("sqrt", "Square root of a number"),
        one_int("cbrt", "Cube root of a number"),
        one_int("factorial", "Factorial of a number"),
        one_int("log", "Natural log of a number"),
        two_ints("remainder", "Remainder of two numbers division"),
        one_int("sin", "Sine of a number (radians)"),
        one_int("cos", "Cosine of a number (radians)"),
        one_int("tan", "Tangent of a number (radians)"),
        two_ints("mine", "Special mining tool"),
        ToolDescriptor::new(
            "strings_to_chars_to_int",
            "Return the ASCII values of the characters in a word",
        )
        .required("string", ParamType::String, "Word to convert"),
        ToolDescriptor::new(
            "int_list_to_exponential_sum",
            "Return sum of exponentials of numbers in a list",
        )
        .required("int_list", ParamType::IntegerArray, "Exponents"),
        ToolDescriptor::new("fibonacci_numbers", "Return the first n Fibonacci numbers")
            .required("n", ParamType::Integer, "How many numbers"),
    ]
}

/// Execute a math tool. `None` means the name is not a math tool.
pub fn execute(name: &str, args: &Arguments) -> Option<Result<String>> {
    let result = match name {
        "add" => binary(args, i64::checked_add),
        "add_list" => add_list(args),
        "subtract" => binary(args, i64::checked_sub),
        "multiply" => binary(args, i64::checked_mul),
        "divide" => divide(args),
        "power" => power(args),
        "sqrt" => sqrt(args),
        "cbrt" => unary_float(args, f64::cbrt),
        "factorial" => factorial(args),
        "log" => log(args),
        "remainder" => remainder(args),
        "sin" => unary_float(args, f64::sin),
        "cos" => unary_float(args, f64::cos),
        "tan" => unary_float(args, f64::tan),
        "mine" => binary(args, |a, b| a.checked_sub(b)?.checked_sub(b)),
        "strings_to_chars_to_int" => chars_to_ints(args),
        "int_list_to_exponential_sum" => exponential_sum(args),
        "fibonacci_numbers" => fibonacci(args),
        _ => return None,
    };
    Some(result)
}

fn binary(args: &Arguments, op: impl Fn(i64, i64) -> Option<i64>) -> Result<String> {
    let a = int_arg(args, "a")?;
    let b = int_arg(args, "b")?;
    op(a, b)
        .map(|v| v.to_string())
        .ok_or_else(|| anyhow!("integer overflow"))
}

fn unary_float(args: &Arguments, op: fn(f64) -> f64) -> Result<String> {
    let a = int_arg(args, "a")?;
    Ok(op(a as f64).to_string())
}

fn add_list(args: &Arguments) -> Result<String> {
    let list = int_list_arg(args, "l")?;
    list.iter()
        .try_fold(0i64, |acc, v| acc.checked_add(*v))
        .map(|v| v.to_string())
        .ok_or_else(|| anyhow!("integer overflow"))
}

fn divide(args: &Arguments) -> Result<String> {
    let a = int_arg(args, "a")?;
    let b = int_arg(args, "b")?;
    if b == 0 {
        bail!("division by zero");
    }
    Ok((a as f64 / b as f64).to_string())
}

fn power(args: &Arguments) -> Result<String> {
    let a = int_arg(args, "a")?;
    let b = int_arg(args, "b")?;
    let exp = u32::try_from(b).map_err(|_| anyhow!("exponent must be a non-negative integer"))?;
    a.checked_pow(exp)
        .map(|v| v.to_string())
        .ok_or_else(|| anyhow!("integer overflow"))
}

fn sqrt(args: &Arguments) -> Result<String> {
    let a = int_arg(args, "a")?;
    if a < 0 {
        bail!("square root of a negative number");
    }
    Ok((a as f64).sqrt().to_string())
}

fn factorial(args: &Arguments) -> Result<String> {
    let a = int_arg(args, "a")?;
    if a < 0 {
        bail!("factorial of a negative number");
    }
    (1..=a)
        .try_fold(1i64, |acc, v| acc.checked_mul(v))
        .map(|v| v.to_string())
        .ok_or_else(|| anyhow!("integer overflow"))
}

fn log(args: &Arguments) -> Result<String> {
    let a = int_arg(args, "a")?;
    if a <= 0 {
        bail!("logarithm of a non-positive number");
    }
    Ok((a as f64).ln().to_string())
}

/// Remainder with the sign of the divisor (floored division).
fn remainder(args: &Arguments) -> Result<String> {
    let a = int_arg(args, "a")?;
    let b = int_arg(args, "b")?;
    if b == 0 {
        bail!("division by zero");
    }
    let r = a.checked_rem(b).ok_or_else(|| anyhow!("integer overflow"))?;
    let r = if r != 0 && (r < 0) != (b < 0) { r + b } else { r };
    Ok(r.to_string())
}

fn chars_to_ints(args: &Arguments) -> Result<String> {
    let word = str_arg(args, "string")?;
    let codes: Vec<u32> = word.chars().map(u32::from).collect();
    Ok(serde_json::to_string(&codes)?)
}

fn exponential_sum(args: &Arguments) -> Result<String> {
    let list = int_list_arg(args, "int_list")?;
    let sum: f64 = list.iter().map(|v| (*v as f64).exp()).sum();
    Ok(sum.to_string())
}

fn fibonacci(args: &Arguments) -> Result<String> {
    let n = int_arg(args, "n")?;
    let mut seq: Vec<u64> = Vec::new();
    let (mut a, mut b) = (0u64, 1u64);
    for i in 0..n.max(0) {
        seq.push(a);
        if i + 1 == n {
            break;
        }
        let next = a
            .checked_add(b)
            .ok_or_else(|| anyhow!("fibonacci sequence overflows past {} terms", seq.len()))?;
        a = b;
        b = next;
    }
    Ok(serde_json::to_string(&seq)?)
}
