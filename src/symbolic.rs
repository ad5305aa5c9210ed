/// eng
/// Minimal symbolic algebra used by the isotopologue model builder: an expression tree over
/// integer numbers and named symbols with sums, products and integer powers, kept in a
/// canonical (flattened, collected, sorted) form so that printing is deterministic.
/// ----------------------------------------------------------------
/// ru
/// Минимальная символьная алгебра для построителя изотопологных моделей: дерево выражений
/// из целых чисел и именованных символов с суммами, произведениями и целыми степенями,
/// хранимое в канонической форме, чтобы печать была детерминированной.
/// # Examples
/// ```
/// use IsoKin::symbolic::symbolic_engine::Expr;
/// let a = Expr::symbol("A0");
/// let b = Expr::symbol("A1");
/// let total = Expr::sum(vec![b.clone(), a.clone(), a.clone()]);
/// assert_eq!(total.to_string(), "2*A0+A1");
/// ```
pub mod symbolic_engine;
