/// eng
/// Error types of every stage of the pipeline: parsing the network text, building the model,
/// reading configuration.
/// ru
/// Типы ошибок всех стадий: разбор текста сети, построение модели, чтение конфигурации.
pub mod errors;
/// eng
/// The module takes as input the text of a metabolic network: atom mapping lines like
/// `C + A | {1:1}` and reaction lines like `AB_C : A + B <=> C`, and produces the [`network_parser::Network`]:
/// 1) reactions with their rate symbols in the order of the text
/// 2) atom mappings between pairs of species
/// 3) species with the number of tracked atoms
/// ----------------------------------------------------------------
/// ru
/// Модуль берет на вход текст метаболической сети: строки соответствия атомов вида `C + A | {1:1}`
/// и строки реакций вида `AB_C : A + B <=> C`, и выдает сеть:
/// 1) реакции с символами скоростей в порядке текста
/// 2) соответствия атомов между парами веществ
/// 3) вещества с числом отслеживаемых атомов
/// ----------------------------------------------------------------
/// # Examples
/// ```
/// use IsoKin::Kinetics::network_parser::Network;
/// let network = Network::parse("C + A | {1:1}\nC + B | {2:1}\nAB_C : A + B <=> C").unwrap();
/// assert_eq!(network.species["C"].atom_count, 2);
/// assert_eq!(network.reactions[0].rates(), vec!["fAB_C", "rAB_C"]);
/// ```
pub mod network_parser;
/// network from a structured JSON document instead of the text format
pub mod stoic_loader;
/// eng
/// Enumeration of isotopologues: every species with n tracked atoms has 2^n labeling
/// patterns, each one gets a C symbol like `C01`. Labeled species carry fixed fractions,
/// the rest become state variables.
/// ru
/// Перечисление изотопологов: вещество с n отслеживаемыми атомами имеет 2^n вариантов мечения,
/// каждый получает символ C вида `C01`. Меченые вещества имеют заданные доли, остальные
/// становятся переменными состояния.
pub mod enumerator;
/// balance equation of every isotopologue of internal species
pub mod ode_builder;
/// mass-balance normalization of the balance equations
pub mod simplifier;
pub mod ode_system;
/// eng
/// Rendering of the finished model as a C function `void name(double* pool_list, double* flux_list,
/// double* solver_time, double* input_list, double* out)` and optionally its Jacobian.
/// ru
/// Вывод готовой модели в виде функции на C и, по желанию, ее якобиана.
pub mod code_emitter;
/// eng
/// Main entry point: from network text (or file, or task) to C code.
///
/// # Examples
/// ```
/// use IsoKin::Kinetics::model_builder::IsotopologueModelBuilder;
/// use IsoKin::settings::{BuildOptions, LabeledSpecies};
/// let builder = IsotopologueModelBuilder::new(
///     "A + B | {1:1}\nA_B : A <=> B",
///     "single",
///     LabeledSpecies::new(),
///     BuildOptions::default(),
/// )
/// .unwrap();
/// let system = builder.build().unwrap();
/// assert_eq!(system.states, vec!["A0", "A1", "B0", "B1"]);
/// ```
pub mod model_builder;
